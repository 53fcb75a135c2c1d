use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sift_model::{RecordId, ScanRecord};
use sift_store::StoreHandle;
use sift_store::error::ErrorKind as StoreErrorKind;
use tracing::instrument;

/// Read-only view of the scan records, usable without a scanning oracle.
#[derive(Clone)]
pub struct Records {
    store: StoreHandle,
}

impl Records {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(record = %id))]
    pub async fn get(&self, id: RecordId) -> Result<ScanRecord> {
        self.store.get(id).await.map_err(|err| {
            let kind = match &*err {
                StoreErrorKind::RecordNotFound(id) => ErrorKind::RecordNotFound(*id),
                _ => ErrorKind::Store,
            };
            err.raise(kind)
        })
    }

    /// Most recently submitted first; `None` lists everything.
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<ScanRecord>> {
        self.store.list(limit).await.or_raise(|| ErrorKind::Store)
    }

    pub async fn find_by_content_hash(&self, content_hash: &str) -> Result<Vec<ScanRecord>> {
        self.store.find_by_content_hash(content_hash).await.or_raise(|| ErrorKind::Store)
    }
}

//! The storage seam used by the orchestrator.

use crate::error::Result;
use async_trait::async_trait;
use sift_model::{NewScan, RecordId, ScanRecord, Verdict};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn ScanStore + Send + Sync>;

/// Persistence for [`ScanRecord`]s.
///
/// Records are created once per accepted upload, completed exactly once, and
/// never deleted.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Persist a new `pending` record, assigning its identifier and
    /// submission time.
    async fn create(&self, scan: &NewScan) -> Result<ScanRecord>;

    /// Persist a record that is terminal from the start, for submissions that
    /// never got as far as polling.
    ///
    /// Returns [`Constraint`](crate::error::ErrorKind::Constraint) if the
    /// verdict breaks a record invariant.
    async fn create_completed(&self, scan: &NewScan, verdict: &Verdict) -> Result<ScanRecord>;

    /// Write the terminal verdict onto a `pending` record.
    ///
    /// Returns [`RecordNotFound`](crate::error::ErrorKind::RecordNotFound) for
    /// unknown ids, [`AlreadyCompleted`](crate::error::ErrorKind::AlreadyCompleted)
    /// if the record already has a verdict (in which case it is left
    /// untouched), and [`Constraint`](crate::error::ErrorKind::Constraint) if
    /// the verdict breaks a record invariant.
    async fn complete(&self, id: RecordId, verdict: &Verdict) -> Result<ScanRecord>;

    async fn get(&self, id: RecordId) -> Result<ScanRecord>;

    /// Most recently submitted first; ties go to the higher id.
    async fn list(&self, limit: Option<usize>) -> Result<Vec<ScanRecord>>;

    async fn list_all(&self) -> Result<Vec<ScanRecord>> {
        self.list(None).await
    }

    /// Every record of the same content, most recent first.
    async fn find_by_content_hash(&self, content_hash: &str) -> Result<Vec<ScanRecord>>;
}

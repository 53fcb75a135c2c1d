//! Submission orchestration.
//!
//! One [`Orchestrator::submit_and_record`] call walks a single upload through
//! the [`Stage`]s: validate, submit to the oracle, create the pending record,
//! poll with a fixed delay and attempt budget, aggregate, and complete the
//! record exactly once. Once a submission has been attempted, every way out
//! leaves a record behind (best effort) except an unreachable oracle, which
//! only records the attempt when asked to.

mod batch;
mod poll;
mod stage;

pub use self::batch::BatchEvent;
pub use self::stage::Stage;
use self::poll::{Polled, poll_until_complete};
use crate::aggregate::aggregate;
use crate::error::{ErrorKind, Result};
use crate::records::Records;
use crate::upload::{Upload, UploadPolicy};
use exn::ResultExt;
use sift_model::{Failure, NewScan, RecordId, ScanRecord, Verdict};
use sift_provider::ProviderHandle;
use sift_provider::error::Error as ProviderError;
use sift_store::StoreHandle;
use std::time::Duration;
use tracing::instrument;

/// How long to wait for the oracle, and how many scans to run at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Polls before giving up. Zero gives up without polling.
    pub max_attempts: u32,
    /// Fixed wait between polls. No backoff.
    pub delay: Duration,
    /// Submissions in flight at once during a batch.
    pub concurrency: usize,
}
impl Default for PollPolicy {
    fn default() -> Self {
        Self { max_attempts: 10, delay: Duration::from_millis(2000), concurrency: 16 }
    }
}

/// Coordinates the scanning oracle and the record store.
pub struct Orchestrator {
    provider: ProviderHandle,
    store: StoreHandle,
    polling: PollPolicy,
    uploads: UploadPolicy,
    record_unreachable: bool,
}

impl Orchestrator {
    pub fn new(provider: ProviderHandle, store: StoreHandle) -> Self {
        Self {
            provider,
            store,
            polling: PollPolicy::default(),
            uploads: UploadPolicy::default(),
            record_unreachable: false,
        }
    }

    pub fn with_poll_policy(mut self, polling: PollPolicy) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_upload_policy(mut self, uploads: UploadPolicy) -> Self {
        self.uploads = uploads;
        self
    }

    /// Also write an error record when the oracle cannot be reached at all.
    ///
    /// Off by default: the caller is expected to retry the whole submission,
    /// and each retry would otherwise leave another error record behind.
    pub fn record_unreachable_submissions(mut self, record: bool) -> Self {
        self.record_unreachable = record;
        self
    }

    /// Scan one upload and record the result.
    ///
    /// Returns the completed record when the oracle produced a verdict. Every
    /// other outcome is an error whose [`record`](ErrorKind::record) names the
    /// error record written for it, if any:
    ///
    /// - [`InvalidUpload`](ErrorKind::InvalidUpload): nothing was sent or recorded.
    /// - [`ProviderUnavailable`](ErrorKind::ProviderUnavailable): the oracle could
    ///   not be reached, either to submit or while polling.
    /// - [`ProviderRejected`](ErrorKind::ProviderRejected): the oracle refused the
    ///   file or its handle.
    /// - [`ScanTimeout`](ErrorKind::ScanTimeout): polling ran out of attempts.
    /// - [`Persistence`](ErrorKind::Persistence): the verdict could not be written.
    /// - [`Store`](ErrorKind::Store): the pending record could not be created.
    #[instrument(skip_all, fields(provider = self.provider.name(), stored_name = %upload.stored_name))]
    pub async fn submit_and_record(&self, upload: &Upload) -> Result<ScanRecord> {
        Stage::Received.enter(None);
        self.uploads.validate(upload)?;
        let scan = upload.to_new_scan();

        Stage::Submitting.enter(None);
        let handle = match self.provider.submit(&upload.data).await {
            Ok(handle) => handle,
            Err(err) => return Err(self.submission_failed(&scan, err).await),
        };

        let record = self
            .store
            .create(&scan.with_provider_handle(handle.as_str()))
            .await
            .or_raise(|| ErrorKind::Store)?;
        Stage::Polling.enter(Some(record.id));
        let outcome = match poll_until_complete(&*self.provider, &handle, &self.polling).await {
            Polled::Complete(outcome) => outcome,
            Polled::Exhausted => return Err(self.timed_out(record.id).await),
            Polled::Failed(err) => return Err(self.poll_failed(record.id, err).await),
        };

        Stage::Aggregating.enter(Some(record.id));
        let verdict = aggregate(&outcome);
        let record = self.persist(record.id, &verdict).await?;
        Stage::Persisted.enter(Some(record.id));
        Ok(record)
    }

    /// Read access to the records this orchestrator writes.
    pub fn records(&self) -> Records {
        Records::new(self.store.clone())
    }

    pub async fn get_record(&self, id: RecordId) -> Result<ScanRecord> {
        self.records().get(id).await
    }

    /// Most recently submitted first.
    pub async fn list_records(&self, limit: Option<usize>) -> Result<Vec<ScanRecord>> {
        self.records().list(limit).await
    }

    /// Every record of the same content, most recent first.
    pub async fn find_duplicates(&self, content_hash: &str) -> Result<Vec<ScanRecord>> {
        self.records().find_by_content_hash(content_hash).await
    }

    /// Write the verdict onto the pending record.
    async fn persist(&self, id: RecordId, verdict: &Verdict) -> Result<ScanRecord> {
        match self.store.complete(id, verdict).await {
            Ok(record) => Ok(record),
            Err(err) => {
                Stage::PersistenceFailed.enter(Some(id));
                Err(err.raise(ErrorKind::Persistence { record: id }))
            },
        }
    }

    /// The submit call itself failed, so there is no pending record yet.
    ///
    /// If the error record cannot be written either, the store failure joins
    /// the provider failure in the returned error tree.
    async fn submission_failed(&self, scan: &NewScan, err: ProviderError) -> crate::error::Error {
        let unavailable = err.is_retryable();
        let written = if unavailable && !self.record_unreachable {
            Ok(None)
        } else {
            let failure = if unavailable { Failure::Unavailable } else { Failure::Rejected };
            let verdict = Verdict::failed(failure, Some((*err).to_string()));
            self.store.create_completed(scan, &verdict).await.map(|record| Some(record.id))
        };
        let recorded = written.as_ref().ok().copied().flatten();
        Stage::SubmissionFailed.enter(recorded);
        let kind = if unavailable {
            ErrorKind::ProviderUnavailable { recorded }
        } else {
            ErrorKind::ProviderRejected { recorded }
        };
        match written {
            Ok(_) => err.raise(kind),
            Err(store_err) => {
                tracing::error!(error = ?store_err, "Could not record the failed submission");
                exn::Exn::raise_all(kind.clone(), [err.raise(kind), store_err.raise(ErrorKind::Store)])
            },
        }
    }

    async fn poll_failed(&self, id: RecordId, err: ProviderError) -> crate::error::Error {
        let unavailable = err.is_retryable();
        let failure = if unavailable { Failure::Unavailable } else { Failure::Rejected };
        if let Err(store_err) = self.persist(id, &Verdict::failed(failure, Some((*err).to_string()))).await {
            return store_err;
        }
        Stage::SubmissionFailed.enter(Some(id));
        if unavailable {
            err.raise(ErrorKind::ProviderUnavailable { recorded: Some(id) })
        } else {
            err.raise(ErrorKind::ProviderRejected { recorded: Some(id) })
        }
    }

    async fn timed_out(&self, id: RecordId) -> crate::error::Error {
        let message = format!("no result after {} polls", self.polling.max_attempts);
        if let Err(store_err) = self.persist(id, &Verdict::failed(Failure::Timeout, Some(message))).await {
            return store_err;
        }
        Stage::TimedOut.enter(Some(id));
        exn::Exn::from(ErrorKind::ScanTimeout { record: id })
    }
}

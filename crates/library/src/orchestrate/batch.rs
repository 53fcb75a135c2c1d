use crate::error::Result;
use crate::orchestrate::Orchestrator;
use crate::upload::{Upload, UploadFile};
use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use sift_model::ScanRecord;
use std::collections::VecDeque;

/// Progress events emitted by [`Orchestrator::scan_batch`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Accepted`](Self::Accepted), exactly once, with the number of uploads.
/// 3. [`Finished`](Self::Finished), once per upload, in completion order.
/// 4. [`Complete`](Self::Complete), exactly once.
#[derive(Debug)]
pub enum BatchEvent {
    Started,
    Accepted(u64),
    /// One upload has been scanned (or failed to be).
    Finished { stored_name: String, result: Result<ScanRecord> },
    Complete,
}

impl Orchestrator {
    /// Stream the scanning of many uploads.
    ///
    /// Each upload runs through [`submit_and_record`](Self::submit_and_record)
    /// with its own poll loop, at most [`concurrency`](crate::PollPolicy::concurrency)
    /// at a time, starting queued uploads in the order given as earlier ones
    /// finish. A failed upload is reported in its `Finished` event and does not
    /// stop the rest.
    pub fn scan_batch(&self, uploads: Vec<Upload>) -> impl Stream<Item = BatchEvent> + '_ {
        self.run_batch(uploads, move |upload| async move {
            let result = self.submit_and_record(&upload).await;
            BatchEvent::Finished { stored_name: upload.stored_name, result }
        })
    }

    /// [`scan_batch`](Self::scan_batch) for files on disk.
    ///
    /// A file is read only when its turn comes, so no more than `concurrency`
    /// files are held in memory at once. Files over the size limit are refused
    /// from their size on disk and never read.
    pub fn scan_files(&self, files: Vec<UploadFile>) -> impl Stream<Item = BatchEvent> + '_ {
        self.run_batch(files, move |file| async move {
            let result = match file.load(&self.uploads).await {
                Ok(upload) => self.submit_and_record(&upload).await,
                Err(err) => Err(err),
            };
            BatchEvent::Finished { stored_name: file.stored_name, result }
        })
    }

    fn run_batch<'a, T, F, Fut>(&'a self, items: Vec<T>, job: F) -> impl Stream<Item = BatchEvent> + 'a
    where
        T: 'a,
        F: FnMut(T) -> Fut + 'a,
        Fut: Future<Output = BatchEvent> + 'a,
    {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            yield BatchEvent::Started;
            yield BatchEvent::Accepted(u64::try_from(items.len()).unwrap_or(u64::MAX));

            let mut queue: VecDeque<Fut> = items.into_iter().map(job).collect();
            let limit = self.polling.concurrency.max(1);
            let mut processing = FuturesUnordered::new();
            processing.extend(queue.drain(..limit.min(queue.len())));
            while let Some(event) = processing.next().await {
                yield event;
                if let Some(next) = queue.pop_front() {
                    processing.push(next);
                }
            }

            yield BatchEvent::Complete;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PollPolicy, UploadPolicy};
    use crate::error::ErrorKind;
    use sift_model::{Classification, ScanOutcome};
    use sift_provider::oracle::MockProvider;
    use sift_store::{Database, Repository, ScanStore};
    use std::sync::Arc;
    use std::time::Duration;

    async fn orchestrator(concurrency: usize) -> (Orchestrator, Arc<MockProvider>, Arc<Repository>) {
        let outcome: ScanOutcome = [("EngineA", "EICAR-Test-File")].into_iter().collect();
        let provider = Arc::new(MockProvider::completing_after(1, outcome));
        let store = Arc::new(Repository::from(&Database::connect_in_memory().await.unwrap()));
        let policy = PollPolicy { delay: Duration::ZERO, concurrency, ..PollPolicy::default() };
        (Orchestrator::new(provider.clone(), store.clone()).with_poll_policy(policy), provider, store)
    }

    fn uploads() -> Vec<Upload> {
        vec![
            Upload::new(b"X5O!P%@AP".to_vec(), "eicar.com", "application/octet-stream").with_stored_name("1-eicar.com"),
            Upload::new(Vec::new(), "empty.pdf", "application/pdf").with_stored_name("2-empty.pdf"),
            Upload::new(b"%PDF-1.7".to_vec(), "invoice.pdf", "application/pdf").with_stored_name("3-invoice.pdf"),
        ]
    }

    #[tokio::test]
    async fn test_batch_event_order() {
        let (orchestrator, provider, store) = orchestrator(2).await;
        let events: Vec<_> = orchestrator.scan_batch(uploads()).collect().await;
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], BatchEvent::Started));
        assert!(matches!(events[1], BatchEvent::Accepted(3)));
        assert!(matches!(events[5], BatchEvent::Complete));

        let mut finished: Vec<_> = events[2..5]
            .iter()
            .map(|event| match event {
                BatchEvent::Finished { stored_name, result } => (stored_name.as_str(), result),
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        finished.sort_by_key(|(name, _)| *name);
        let (_, eicar) = finished[0];
        assert_eq!(eicar.as_ref().unwrap().classification, Classification::Malicious);
        let (_, empty) = finished[1];
        assert!(matches!(&**empty.as_ref().unwrap_err(), ErrorKind::InvalidUpload(_)));
        let (_, invoice) = finished[2];
        assert!(invoice.is_ok());

        // The empty upload never reached the oracle.
        assert_eq!(provider.submissions(), 2);
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (orchestrator, provider, _store) = orchestrator(16).await;
        let events: Vec<_> = orchestrator.scan_batch(Vec::new()).collect().await;
        assert!(matches!(events.as_slice(), [BatchEvent::Started, BatchEvent::Accepted(0), BatchEvent::Complete]));
        assert_eq!(provider.submissions(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_of_one_runs_every_upload() {
        let (orchestrator, provider, _store) = orchestrator(1).await;
        let events: Vec<_> = orchestrator.scan_batch(uploads()).collect().await;
        let finished = events.iter().filter(|e| matches!(e, BatchEvent::Finished { .. })).count();
        assert_eq!(finished, 3);
        assert_eq!(provider.polls(), 4);
    }

    #[tokio::test]
    async fn test_files_over_the_limit_are_never_submitted() {
        let (orchestrator, provider, store) = orchestrator(2).await;
        let orchestrator = orchestrator.with_upload_policy(UploadPolicy { max_size_bytes: 16, ..UploadPolicy::default() });
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.pdf"), b"%PDF-1.7").unwrap();
        std::fs::write(dir.path().join("big.iso"), vec![0_u8; 4096]).unwrap();
        let files = vec![
            UploadFile::new(dir.path().join("small.pdf"), "application/pdf"),
            UploadFile::new(dir.path().join("big.iso"), "application/octet-stream"),
            UploadFile::new(dir.path().join("missing.pdf"), "application/pdf"),
        ];

        let mut results: Vec<_> = orchestrator
            .scan_files(files)
            .filter_map(|event| async move {
                match event {
                    BatchEvent::Finished { stored_name, result } => Some((stored_name, result)),
                    _ => None,
                }
            })
            .collect()
            .await;
        results.sort_by(|(a, _), (b, _)| a.rsplit('-').next().cmp(&b.rsplit('-').next()));

        assert_eq!(results.len(), 3);
        let (_, big) = &results[0];
        assert_eq!(
            &**big.as_ref().unwrap_err(),
            &ErrorKind::InvalidUpload("file is 4096 bytes, the limit is 16".to_string())
        );
        let (_, missing) = &results[1];
        assert!(matches!(&**missing.as_ref().unwrap_err(), ErrorKind::Unreadable(_)));
        let (_, small) = &results[2];
        assert_eq!(small.as_ref().unwrap().classification, Classification::Malicious);

        assert_eq!(provider.submissions(), 1);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}

//! Scripted in-process oracle for tests.

use crate::error::{ErrorKind, Result};
use crate::models::{Progress, SubmissionHandle};
use crate::oracle::ScanProvider;
use async_trait::async_trait;
use sift_model::ScanOutcome;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
enum OnSubmit {
    Accept,
    Fail(ErrorKind),
}

#[derive(Debug, Clone)]
enum OnPoll {
    /// Report progress this many times, then the outcome.
    CompleteAfter(u32, ScanOutcome),
    Never,
    /// Report progress this many times, then fail.
    FailAfter(u32, ErrorKind),
}

/// A [`ScanProvider`] that follows a fixed script and counts the calls made to it.
///
/// Poll counts are tracked per handle, so several submissions through the same
/// mock progress independently.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    on_submit: OnSubmit,
    on_poll: OnPoll,
    polled: Mutex<HashMap<SubmissionHandle, u32>>,
    submissions: AtomicUsize,
    polls: AtomicUsize,
}

impl MockProvider {
    fn scripted(on_submit: OnSubmit, on_poll: OnPoll) -> Self {
        Self {
            name: "mock".to_string(),
            on_submit,
            on_poll,
            polled: Mutex::new(HashMap::new()),
            submissions: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    /// Completes with `outcome` on the first poll.
    pub fn completing(outcome: ScanOutcome) -> Self {
        Self::completing_after(0, outcome)
    }

    /// Reports progress `pending` times before completing with `outcome`.
    pub fn completing_after(pending: u32, outcome: ScanOutcome) -> Self {
        Self::scripted(OnSubmit::Accept, OnPoll::CompleteAfter(pending, outcome))
    }

    /// Accepts submissions but never finishes scanning them.
    pub fn never_completing() -> Self {
        Self::scripted(OnSubmit::Accept, OnPoll::Never)
    }

    /// Fails every submission as if the oracle could not be reached.
    pub fn unreachable() -> Self {
        Self::scripted(OnSubmit::Fail(ErrorKind::Unavailable("connection refused".to_string())), OnPoll::Never)
    }

    /// Refuses every submission.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self::scripted(OnSubmit::Fail(ErrorKind::Rejected(reason.into())), OnPoll::Never)
    }

    /// Accepts submissions, reports progress `pending` times, then fails with `kind`.
    pub fn failing_poll_after(pending: u32, kind: ErrorKind) -> Self {
        Self::scripted(OnSubmit::Accept, OnPoll::FailAfter(pending, kind))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of `submit` calls so far, successful or not.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Number of `poll` calls so far, across all handles.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, _data: &[u8]) -> Result<SubmissionHandle> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        match &self.on_submit {
            OnSubmit::Accept => Ok(SubmissionHandle::new(format!("mock-{n}"))),
            OnSubmit::Fail(kind) => exn::bail!(kind.clone()),
        }
    }

    async fn poll(&self, handle: &SubmissionHandle) -> Result<Progress> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let seen = {
            let mut polled = self.polled.lock().await;
            let count = polled.entry(handle.clone()).or_default();
            let seen = *count;
            *count += 1;
            seen
        };
        match &self.on_poll {
            OnPoll::CompleteAfter(pending, outcome) if seen >= *pending => Ok(Progress::Complete(outcome.clone())),
            OnPoll::FailAfter(pending, kind) if seen >= *pending => exn::bail!(kind.clone()),
            _ => Ok(Progress::InProgress(None)),
        }
    }
}

use crate::orchestrate::PollPolicy;
use sift_model::ScanOutcome;
use sift_provider::error::Error as ProviderError;
use sift_provider::{Progress, ScanProvider, SubmissionHandle};

/// How a poll loop ended.
#[derive(Debug)]
pub(crate) enum Polled {
    Complete(ScanOutcome),
    /// Every attempt came back in progress.
    Exhausted,
    /// A single poll failed; the loop stops at the first failure.
    Failed(ProviderError),
}

/// Poll `handle` until the oracle reports a terminal outcome or the attempt
/// budget runs out. The first poll goes out immediately; the policy's fixed
/// delay separates each in-progress answer from the next attempt.
pub(crate) async fn poll_until_complete(
    provider: &dyn ScanProvider,
    handle: &SubmissionHandle,
    policy: &PollPolicy,
) -> Polled {
    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            tokio::time::sleep(policy.delay).await;
        }
        match provider.poll(handle).await {
            Ok(Progress::Complete(outcome)) => {
                tracing::debug!(attempt, engines = outcome.len(), "Oracle finished scanning");
                return Polled::Complete(outcome);
            },
            Ok(Progress::InProgress(percent)) => tracing::trace!(attempt, ?percent, "Oracle still scanning"),
            Err(err) => return Polled::Failed(err),
        }
    }
    Polled::Exhausted
}

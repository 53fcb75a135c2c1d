//! Scan provider trait and implementations.
//!
//! The `ScanProvider` trait is the seam between the orchestrator and the
//! external scanning oracle: submit bytes once, then poll the returned handle
//! until the oracle reports completion. Polling policy (how often, how many
//! times) belongs to the caller, not the provider.

mod metadefender;
#[cfg(feature = "mock")]
mod mock;

pub use self::metadefender::{MetaDefender, MetaDefenderConfig};
#[cfg(feature = "mock")]
pub use self::mock::MockProvider;
use crate::error::Result;
use crate::models::{Progress, SubmissionHandle};
use async_trait::async_trait;

/// Unified interface for asynchronous, multi-engine scanning oracles.
///
/// Each method performs (at most) one outbound call. Implementations never
/// retry internally: a transport failure surfaces as
/// [`Unavailable`](crate::error::ErrorKind::Unavailable) and the caller decides
/// what happens next.
///
/// # Examples
///
/// ```
/// use sift_provider::{Progress, ScanProvider};
/// use sift_provider::error::Result;
///
/// async fn scan_once(provider: &dyn ScanProvider, data: &[u8]) -> Result<bool> {
///     let handle = provider.submit(data).await?;
///     Ok(provider.poll(&handle).await?.is_complete())
/// }
/// ```
#[async_trait]
pub trait ScanProvider: Send + Sync {
    /// Name of the oracle (used for logging only).
    fn name(&self) -> &str;

    /// Send the raw file content to the oracle.
    ///
    /// Returns [`Unavailable`](crate::error::ErrorKind::Unavailable) on
    /// transport failure and [`Rejected`](crate::error::ErrorKind::Rejected)
    /// when the oracle refuses the payload or its response carries no handle.
    async fn submit(&self, data: &[u8]) -> Result<SubmissionHandle>;

    /// Query the current status of a submission.
    ///
    /// Returns [`Progress::Complete`] only once the oracle reports 100%
    /// progress; anything less is [`Progress::InProgress`].
    async fn poll(&self, handle: &SubmissionHandle) -> Result<Progress>;
}

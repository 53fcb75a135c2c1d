pub mod error;
mod models;
pub mod oracle;

pub use crate::models::{Progress, SubmissionHandle};
pub use crate::oracle::ScanProvider;
use std::sync::Arc;

pub type ProviderHandle = Arc<dyn ScanProvider + Send + Sync>;

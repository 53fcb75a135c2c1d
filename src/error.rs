//! CLI Error Types

use derive_more::{Display, Error};

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("no API key configured (set provider.api_key or SIFT_PROVIDER__API_KEY)")]
    MissingApiKey,
    #[display("could not set up the scan provider")]
    Provider,
    #[display("could not open the scan store")]
    Store,
    #[display("scan record lookup failed")]
    Lookup,
}

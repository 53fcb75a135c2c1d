//! MetaDefender Cloud (v4) client.

use crate::error::{ErrorKind, Result};
use crate::models::{Progress, SubmissionHandle};
use crate::oracle::ScanProvider;
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use sift_model::ScanOutcome;
use std::time::Duration;
use tracing::instrument;

const NAME: &str = "metadefender";
const API_KEY_HEADER: &str = "apikey";
const COMPLETE: u64 = 100;

/// Connection settings for [`MetaDefender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDefenderConfig {
    /// API root, without the trailing `/file`.
    pub base_url: String,
    pub api_key: String,
    /// Applies to each request individually, not to a whole scan.
    pub timeout: Duration,
}
impl MetaDefenderConfig {
    pub const DEFAULT_BASE_URL: &str = "https://api.metadefender.com/v4";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    data_id: Option<String>,
}

#[derive(Deserialize)]
struct PollResponse {
    scan_results: Option<ScanResults>,
}

#[derive(Deserialize)]
struct ScanResults {
    progress_percentage: Option<u64>,
    #[serde(default)]
    scan_details: Map<String, Value>,
}
impl ScanResults {
    fn into_outcome(self) -> ScanOutcome {
        self.scan_details
            .into_iter()
            .map(|(engine, detail)| {
                // Engines that found nothing report either an empty string or no field at all.
                let threat = detail.get("threat_found").and_then(Value::as_str).unwrap_or_default().to_string();
                (engine, threat)
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    messages: Vec<String>,
}

/// The first human-readable message from an error response, if the oracle sent one.
fn oracle_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorResponse>(body).ok()?.error?.messages.into_iter().next()
}

/// Client for the MetaDefender Cloud file scanning API.
///
/// - `POST {base}/file` with the raw bytes returns a `data_id`.
/// - `GET {base}/file/{data_id}` reports `progress_percentage` and, per engine,
///   a `threat_found` label (empty when clean).
pub struct MetaDefender {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MetaDefender {
    pub fn new(config: MetaDefenderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            exn::bail!(ErrorKind::Configuration("missing API key".to_string()));
        }
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            exn::bail!(ErrorKind::Configuration("missing base URL".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .or_raise(|| ErrorKind::Configuration("could not build HTTP client".to_string()))?;
        Ok(Self { client, base_url, api_key: config.api_key })
    }

    fn file_url(&self) -> String {
        format!("{}/file", self.base_url)
    }

    /// Send a request and return the body of a successful response.
    ///
    /// Overload (429) and server-side (5xx) failures are worth retrying later;
    /// every other non-success status means the oracle will not accept this
    /// request as sent.
    async fn send(&self, request: RequestBuilder, action: &'static str) -> Result<Vec<u8>> {
        let response = request
            .header(API_KEY_HEADER, self.api_key.as_str())
            .send()
            .await
            .or_raise(|| ErrorKind::Unavailable(format!("{action}: request failed")))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .or_raise(|| ErrorKind::Unavailable(format!("{action}: response interrupted")))?;
        if status.is_success() {
            return Ok(body.to_vec());
        }
        let message = match oracle_message(&body) {
            Some(detail) => format!("{action}: HTTP {status}: {detail}"),
            None => format!("{action}: HTTP {status}"),
        };
        tracing::debug!(provider = NAME, %status, "Oracle answered with an error status");
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            exn::bail!(ErrorKind::Unavailable(message));
        }
        exn::bail!(ErrorKind::Rejected(message));
    }
}

#[async_trait]
impl ScanProvider for MetaDefender {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip(self, data), fields(provider = NAME, size = data.len()))]
    async fn submit(&self, data: &[u8]) -> Result<SubmissionHandle> {
        let request = self.client.post(self.file_url()).header(CONTENT_TYPE, "application/octet-stream").body(data.to_vec());
        let body = self.send(request, "submit").await?;
        let response: SubmitResponse = serde_json::from_slice(&body)
            .or_raise(|| ErrorKind::Rejected("submit: undecodable response".to_string()))?;
        match response.data_id {
            Some(id) if !id.trim().is_empty() => Ok(SubmissionHandle::new(id)),
            _ => exn::bail!(ErrorKind::Rejected("submit: response carried no data_id".to_string())),
        }
    }

    #[instrument(skip_all, fields(provider = NAME, handle = %handle))]
    async fn poll(&self, handle: &SubmissionHandle) -> Result<Progress> {
        let request = self.client.get(format!("{}/{}", self.file_url(), handle.as_str()));
        let body = self.send(request, "poll").await?;
        let response: PollResponse =
            serde_json::from_slice(&body).or_raise(|| ErrorKind::Rejected("poll: undecodable response".to_string()))?;
        let Some(results) = response.scan_results else {
            return Ok(Progress::InProgress(None));
        };
        Ok(match results.progress_percentage {
            Some(COMPLETE) => Progress::Complete(results.into_outcome()),
            other => Progress::InProgress(other.and_then(|p| u8::try_from(p).ok())),
        })
    }
}

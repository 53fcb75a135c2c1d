use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sift_model::NewScan;
use std::path::PathBuf;
use time::UtcDateTime;

/// Name a file is stored under: the upload time in Unix milliseconds, a dash,
/// then the name the client supplied.
pub fn stored_name(original_name: &str, at: UtcDateTime) -> String {
    format!("{}-{original_name}", at.unix_timestamp_nanos() / 1_000_000)
}

/// A file accepted by the boundary layer, awaiting a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub data: Vec<u8>,
    pub stored_name: String,
    pub original_name: String,
    pub mime_type: String,
    /// Size as declared by the client; must agree with `data`.
    pub size_bytes: u64,
    pub owner_id: Option<String>,
}
impl Upload {
    /// An anonymous upload stored under a fresh [`stored_name`].
    pub fn new(data: Vec<u8>, original_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let original_name = original_name.into();
        Self {
            size_bytes: u64::try_from(data.len()).unwrap_or(u64::MAX),
            data,
            stored_name: stored_name(&original_name, UtcDateTime::now()),
            original_name,
            mime_type: mime_type.into(),
            owner_id: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_stored_name(mut self, stored_name: impl Into<String>) -> Self {
        self.stored_name = stored_name.into();
        self
    }

    /// BLAKE3 digest of the content, hex encoded.
    pub fn content_hash(&self) -> String {
        blake3::hash(&self.data).to_hex().to_string()
    }

    pub(crate) fn to_new_scan(&self) -> NewScan {
        NewScan {
            stored_name: self.stored_name.clone(),
            original_name: self.original_name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes,
            content_hash: self.content_hash(),
            owner_id: self.owner_id.clone(),
            provider_handle: None,
        }
    }
}

/// A file on disk, read into memory only when its scan starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub stored_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub owner_id: Option<String>,
}
impl UploadFile {
    /// Named after the last component of `path` and stored under a fresh [`stored_name`].
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        let path = path.into();
        let original_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        Self {
            stored_name: stored_name(&original_name, UtcDateTime::now()),
            original_name,
            mime_type: mime_type.into(),
            owner_id: None,
            path,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Read the file. Its size on disk is checked against `policy` first, so
    /// an oversized file is refused without being read.
    pub async fn load(&self, policy: &UploadPolicy) -> Result<Upload> {
        let metadata = tokio::fs::metadata(&self.path).await.or_raise(|| ErrorKind::Unreadable(self.path.clone()))?;
        policy.check_size(metadata.len())?;
        let data = tokio::fs::read(&self.path).await.or_raise(|| ErrorKind::Unreadable(self.path.clone()))?;
        let mut upload = Upload::new(data, self.original_name.as_str(), self.mime_type.as_str())
            .with_stored_name(self.stored_name.as_str());
        upload.owner_id = self.owner_id.clone();
        Ok(upload)
    }
}

/// What the orchestrator accepts before it talks to the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_size_bytes: u64,
    /// Case-insensitive. Empty allows every type.
    pub allowed_mime_types: Vec<String>,
}
impl Default for UploadPolicy {
    fn default() -> Self {
        Self { max_size_bytes: 10 * 1024 * 1024, allowed_mime_types: Vec::new() }
    }
}
impl UploadPolicy {
    /// Refuse uploads that should never reach the oracle.
    pub fn validate(&self, upload: &Upload) -> Result<()> {
        if upload.original_name.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidUpload("missing file name".to_string()));
        }
        if upload.data.is_empty() {
            exn::bail!(ErrorKind::InvalidUpload("file is empty".to_string()));
        }
        if u64::try_from(upload.data.len()).ok() != Some(upload.size_bytes) {
            exn::bail!(ErrorKind::InvalidUpload(format!(
                "declared size {} does not match {} bytes received",
                upload.size_bytes,
                upload.data.len()
            )));
        }
        self.check_size(upload.size_bytes)?;
        let allowed = self.allowed_mime_types.is_empty()
            || self.allowed_mime_types.iter().any(|mime| mime.trim().eq_ignore_ascii_case(upload.mime_type.trim()));
        if !allowed {
            exn::bail!(ErrorKind::InvalidUpload(format!("file type {} is not allowed", upload.mime_type)));
        }
        Ok(())
    }

    pub fn check_size(&self, size_bytes: u64) -> Result<()> {
        if size_bytes > self.max_size_bytes {
            exn::bail!(ErrorKind::InvalidUpload(format!(
                "file is {size_bytes} bytes, the limit is {}",
                self.max_size_bytes
            )));
        }
        Ok(())
    }
}

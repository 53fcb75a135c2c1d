use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use sift_model::{Classification, Detection, Failure, NewScan, RecordId, ScanRecord, Verdict};
use time::UtcDateTime;

/// Persisted form of a [`Detection`].
#[derive(Serialize, Deserialize)]
struct DetectionRow {
    engine: String,
    threat: String,
}

fn encode_detections(detections: &[Detection]) -> Result<String, Error> {
    let rows: Vec<DetectionRow> = detections
        .iter()
        .map(|d| DetectionRow { engine: d.engine.clone(), threat: d.threat.clone() })
        .collect();
    serde_json::to_string(&rows).or_raise(|| ErrorKind::InvalidData("detections"))
}

fn decode_detections(json: &str) -> Result<Vec<Detection>, Error> {
    let rows: Vec<DetectionRow> = serde_json::from_str(json).or_raise(|| ErrorKind::InvalidData("detections"))?;
    Ok(rows.into_iter().map(|r| Detection::new(r.engine, r.threat)).collect())
}

fn timestamp(seconds: i64) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

/// A full row of the `scans` table.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ScanRow {
    id: i64,
    stored_name: String,
    original_name: String,
    mime_type: String,
    size_bytes: i64,
    content_hash: String,
    owner_id: Option<String>,
    provider_handle: Option<String>,
    classification: String,
    malicious_count: i64,
    suspicious_count: i64,
    detections: String,
    failure: Option<String>,
    failure_message: Option<String>,
    submitted_at: i64,
    completed_at: Option<i64>,
}
impl TryFrom<ScanRow> for ScanRecord {
    type Error = Error;
    fn try_from(row: ScanRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: RecordId::new(row.id),
            stored_name: row.stored_name,
            original_name: row.original_name,
            mime_type: row.mime_type,
            size_bytes: u64::try_from(row.size_bytes).or_raise(|| ErrorKind::InvalidData("size"))?,
            content_hash: row.content_hash,
            owner_id: row.owner_id,
            provider_handle: row.provider_handle,
            classification: row
                .classification
                .parse::<Classification>()
                .or_raise(|| ErrorKind::InvalidData("classification"))?,
            malicious_count: u32::try_from(row.malicious_count).or_raise(|| ErrorKind::InvalidData("malicious count"))?,
            suspicious_count: u32::try_from(row.suspicious_count)
                .or_raise(|| ErrorKind::InvalidData("suspicious count"))?,
            detections: decode_detections(&row.detections)?,
            failure: row
                .failure
                .map(|f| f.parse::<Failure>())
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("failure"))?,
            failure_message: row.failure_message,
            submitted_at: timestamp(row.submitted_at)?,
            completed_at: row.completed_at.map(timestamp).transpose()?,
        })
    }
}

/// Columns written when a record is created.
pub(crate) struct NewScanRow {
    pub stored_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub content_hash: String,
    pub owner_id: Option<String>,
    pub provider_handle: Option<String>,
    pub submitted_at: i64,
}
impl TryFrom<&NewScan> for NewScanRow {
    type Error = Error;
    fn try_from(scan: &NewScan) -> Result<Self, Self::Error> {
        Ok(Self {
            stored_name: scan.stored_name.clone(),
            original_name: scan.original_name.clone(),
            mime_type: scan.mime_type.clone(),
            size_bytes: i64::try_from(scan.size_bytes).or_raise(|| ErrorKind::InvalidData("size"))?,
            content_hash: scan.content_hash.clone(),
            owner_id: scan.owner_id.clone(),
            provider_handle: scan.provider_handle.clone(),
            submitted_at: UtcDateTime::now().unix_timestamp(),
        })
    }
}

/// Columns written when a record leaves `pending`.
pub(crate) struct VerdictRow {
    pub classification: &'static str,
    pub malicious_count: i64,
    pub suspicious_count: i64,
    pub detections: String,
    pub failure: Option<&'static str>,
    pub failure_message: Option<String>,
}
impl TryFrom<&Verdict> for VerdictRow {
    type Error = Error;
    fn try_from(verdict: &Verdict) -> Result<Self, Self::Error> {
        Ok(Self {
            classification: verdict.classification.as_str(),
            malicious_count: i64::from(verdict.malicious_count),
            suspicious_count: i64::from(verdict.suspicious_count),
            detections: encode_detections(&verdict.detections)?,
            failure: verdict.failure.as_ref().map(Failure::as_str),
            failure_message: verdict.failure_message.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ScanRow {
        ScanRow {
            id: 12,
            stored_name: "1700000000000-invoice.pdf".to_string(),
            original_name: "invoice.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 2048,
            content_hash: "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262".to_string(),
            owner_id: None,
            provider_handle: Some("bzI1MDIxN".to_string()),
            classification: "malicious".to_string(),
            malicious_count: 1,
            suspicious_count: 0,
            detections: r#"[{"engine":"EngineB","threat":"Trojan.X"}]"#.to_string(),
            failure: None,
            failure_message: None,
            submitted_at: 1_700_000_000,
            completed_at: Some(1_700_000_004),
        }
    }

    #[test]
    fn test_row_to_model() {
        let record = ScanRecord::try_from(row()).unwrap();
        assert_eq!(record.id, RecordId::new(12));
        assert_eq!(record.classification, Classification::Malicious);
        assert_eq!(record.detections, vec![Detection::new("EngineB", "Trojan.X")]);
        assert_eq!(record.completed_at.map(|t| t.unix_timestamp()), Some(1_700_000_004));
    }

    #[test]
    fn test_row_with_unknown_classification() {
        let err = ScanRecord::try_from(ScanRow { classification: "quarantined".to_string(), ..row() }).unwrap_err();
        assert_eq!(&*err, &ErrorKind::InvalidData("classification"));
    }

    #[test]
    fn test_row_with_corrupt_detections() {
        let err = ScanRecord::try_from(ScanRow { detections: "not json".to_string(), ..row() }).unwrap_err();
        assert_eq!(&*err, &ErrorKind::InvalidData("detections"));
    }

    #[test]
    fn test_verdict_to_row() {
        let verdict = Verdict::failed(Failure::Timeout, Some("gave up after 10 polls".to_string()));
        let row = VerdictRow::try_from(&verdict).unwrap();
        assert_eq!(row.classification, "error");
        assert_eq!(row.failure, Some("timeout"));
        assert_eq!(row.detections, "[]");
    }
}

//! Plain-text rendering of scan records.

use sift_model::{Classification, ScanRecord};
use std::fmt::Write;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcDateTime};

fn timestamp(at: UtcDateTime) -> String {
    OffsetDateTime::from(at).format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

fn status(record: &ScanRecord) -> String {
    match (record.classification, record.failure) {
        (Classification::Error, Some(failure)) => format!("{} ({failure})", record.classification),
        (classification, _) => classification.to_string(),
    }
}

/// One line per record, for `scan` and `list`.
pub fn summary_line(record: &ScanRecord) -> String {
    let mut line = format!("#{} {} {}", record.id, record.original_name, status(record));
    if record.classification == Classification::Malicious {
        _ = write!(line, " [{} engine(s)]", record.malicious_count);
    }
    line
}

/// Every stored field, for `show`.
pub fn render_record(record: &ScanRecord) -> String {
    let mut out = String::new();
    _ = writeln!(out, "id:               {}", record.id);
    _ = writeln!(out, "original name:    {}", record.original_name);
    _ = writeln!(out, "stored name:      {}", record.stored_name);
    _ = writeln!(out, "mime type:        {}", record.mime_type);
    _ = writeln!(out, "size:             {} bytes", record.size_bytes);
    _ = writeln!(out, "blake3:           {}", record.content_hash);
    _ = writeln!(out, "owner:            {}", record.owner_id.as_deref().unwrap_or("-"));
    _ = writeln!(out, "provider handle:  {}", record.provider_handle.as_deref().unwrap_or("-"));
    _ = writeln!(out, "classification:   {}", status(record));
    _ = writeln!(out, "malicious:        {}", record.malicious_count);
    _ = writeln!(out, "suspicious:       {}", record.suspicious_count);
    if let Some(message) = &record.failure_message {
        _ = writeln!(out, "failure message:  {message}");
    }
    _ = writeln!(out, "submitted at:     {}", timestamp(record.submitted_at));
    _ = writeln!(out, "completed at:     {}", record.completed_at.map_or_else(|| "-".to_string(), timestamp));
    for detection in &record.detections {
        _ = writeln!(out, "detection:        {}: {}", detection.engine, detection.threat);
    }
    out
}

/// The scan report handed to document renderers: status, counts, hash, scan
/// time, then numbered detections.
pub fn render_report(record: &ScanRecord) -> String {
    let mut out = String::new();
    _ = writeln!(out, "Scan Report: {}", record.original_name);
    _ = writeln!(out);
    _ = writeln!(out, "Status: {}", status(record));
    _ = writeln!(out, "Malicious: {}", record.malicious_count);
    _ = writeln!(out, "Suspicious: {}", record.suspicious_count);
    _ = writeln!(out, "BLAKE3: {}", record.content_hash);
    let scanned = record.completed_at.map_or_else(|| "pending".to_string(), timestamp);
    _ = writeln!(out, "Scan Time: {scanned}");
    if !record.detections.is_empty() {
        _ = writeln!(out);
        _ = writeln!(out, "Detected Threats:");
        for (i, detection) in record.detections.iter().enumerate() {
            _ = writeln!(out, "{}. {}: {}", i + 1, detection.engine, detection.threat);
        }
    }
    out
}

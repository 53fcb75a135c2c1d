//! SQLite-backed [`ScanStore`].

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{NewScanRow, ScanRow, VerdictRow};
use crate::store::ScanStore;
use async_trait::async_trait;
use exn::ResultExt;
use sift_model::{Classification, NewScan, RecordId, ScanRecord, Verdict};
use sqlx::SqlitePool;
use tracing::instrument;

/// Repository for scan records.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, row: NewScanRow, verdict: Option<&Verdict>) -> Result<ScanRecord> {
        let (verdict, completed_at) = match verdict {
            Some(verdict) => (VerdictRow::try_from(verdict)?, Some(row.submitted_at)),
            None => (
                VerdictRow {
                    classification: Classification::Pending.as_str(),
                    malicious_count: 0,
                    suspicious_count: 0,
                    detections: "[]".to_string(),
                    failure: None,
                    failure_message: None,
                },
                None,
            ),
        };
        let row: ScanRow = sqlx::query_as(include_str!("../queries/insert_scan.sql"))
            .bind(row.stored_name)
            .bind(row.original_name)
            .bind(row.mime_type)
            .bind(row.size_bytes)
            .bind(row.content_hash)
            .bind(row.owner_id)
            .bind(row.provider_handle)
            .bind(verdict.classification)
            .bind(verdict.malicious_count)
            .bind(verdict.suspicious_count)
            .bind(verdict.detections)
            .bind(verdict.failure)
            .bind(verdict.failure_message)
            .bind(row.submitted_at)
            .bind(completed_at)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        row.try_into()
    }

    fn check(verdict: &Verdict) -> Result<()> {
        verdict.validate().or_raise(|| ErrorKind::Constraint("verdict"))
    }
}

#[async_trait]
impl ScanStore for Repository {
    #[instrument(skip_all, fields(stored_name = %scan.stored_name))]
    async fn create(&self, scan: &NewScan) -> Result<ScanRecord> {
        let record = self.insert(NewScanRow::try_from(scan)?, None).await?;
        tracing::debug!(record = %record.id, "Created pending scan record");
        Ok(record)
    }

    #[instrument(skip_all, fields(stored_name = %scan.stored_name, classification = %verdict.classification))]
    async fn create_completed(&self, scan: &NewScan, verdict: &Verdict) -> Result<ScanRecord> {
        Self::check(verdict)?;
        let record = self.insert(NewScanRow::try_from(scan)?, Some(verdict)).await?;
        tracing::debug!(record = %record.id, "Created completed scan record");
        Ok(record)
    }

    #[instrument(skip_all, fields(record = %id, classification = %verdict.classification))]
    async fn complete(&self, id: RecordId, verdict: &Verdict) -> Result<ScanRecord> {
        Self::check(verdict)?;
        let verdict = VerdictRow::try_from(verdict)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Unavailable)?;
        let updated: Option<ScanRow> = sqlx::query_as(include_str!("../queries/complete_scan.sql"))
            .bind(verdict.classification)
            .bind(verdict.malicious_count)
            .bind(verdict.suspicious_count)
            .bind(verdict.detections)
            .bind(verdict.failure)
            .bind(verdict.failure_message)
            .bind(time::UtcDateTime::now().unix_timestamp())
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        let Some(row) = updated else {
            // Nothing pending matched: either there is no such record, or it already has a verdict.
            let existing: Option<ScanRow> = sqlx::query_as(include_str!("../queries/get_scan.sql"))
                .bind(id.get())
                .fetch_optional(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Unavailable)?;
            match existing {
                Some(_) => exn::bail!(ErrorKind::AlreadyCompleted(id)),
                None => exn::bail!(ErrorKind::RecordNotFound(id)),
            }
        };
        tx.commit().await.or_raise(|| ErrorKind::Unavailable)?;
        tracing::debug!("Completed scan record");
        row.try_into()
    }

    #[instrument(skip_all, fields(record = %id))]
    async fn get(&self, id: RecordId) -> Result<ScanRecord> {
        let row: Option<ScanRow> = sqlx::query_as(include_str!("../queries/get_scan.sql"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        match row {
            Some(row) => row.try_into(),
            None => exn::bail!(ErrorKind::RecordNotFound(id)),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, limit: Option<usize>) -> Result<Vec<ScanRecord>> {
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let rows: Vec<ScanRow> = sqlx::query_as(include_str!("../queries/list_scans.sql"))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        rows.into_iter().map(ScanRecord::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn find_by_content_hash(&self, content_hash: &str) -> Result<Vec<ScanRecord>> {
        let rows: Vec<ScanRow> = sqlx::query_as(include_str!("../queries/find_by_content_hash.sql"))
            .bind(content_hash)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Unavailable)?;
        rows.into_iter().map(ScanRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sift_model::{Detection, Failure};

    async fn repo() -> Repository {
        Repository::from(&Database::connect_in_memory().await.unwrap())
    }

    fn upload(name: &str, hash: &str) -> NewScan {
        NewScan {
            stored_name: format!("1700000000000-{name}"),
            original_name: name.to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 1024,
            content_hash: hash.to_string(),
            owner_id: Some("user-1".to_string()),
            provider_handle: None,
        }
    }

    fn malicious() -> Verdict {
        Verdict {
            classification: Classification::Malicious,
            malicious_count: 1,
            detections: vec![Detection::new("EngineB", "Trojan.X")],
            ..Verdict::safe()
        }
    }

    #[tokio::test]
    async fn test_create_is_pending() {
        let repo = repo().await;
        let scan = upload("invoice.pdf", "aa").with_provider_handle("bzI1MDIxN");
        let record = repo.create(&scan).await.unwrap();
        assert_eq!(record.classification, Classification::Pending);
        assert_eq!(record.original_name, "invoice.pdf");
        assert_eq!(record.provider_handle.as_deref(), Some("bzI1MDIxN"));
        assert_eq!(record.owner_id.as_deref(), Some("user-1"));
        assert!(record.detections.is_empty());
        assert!(!record.is_complete());
        assert_eq!(repo.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let repo = repo().await;
        let first = repo.create(&upload("a.pdf", "aa")).await.unwrap();
        let second = repo.create(&upload("a.pdf", "aa")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_complete_writes_verdict() {
        let repo = repo().await;
        let record = repo.create(&upload("a.pdf", "aa")).await.unwrap();
        let completed = repo.complete(record.id, &malicious()).await.unwrap();
        assert_eq!(completed.id, record.id);
        assert_eq!(completed.classification, Classification::Malicious);
        assert_eq!(completed.malicious_count, 1);
        assert_eq!(completed.detections, vec![Detection::new("EngineB", "Trojan.X")]);
        assert!(completed.is_complete());
        assert_eq!(completed.submitted_at, record.submitted_at);
        assert_eq!(repo.get(record.id).await.unwrap(), completed);
    }

    #[tokio::test]
    async fn test_complete_is_write_once() {
        let repo = repo().await;
        let record = repo.create(&upload("a.pdf", "aa")).await.unwrap();
        let completed = repo.complete(record.id, &Verdict::safe()).await.unwrap();
        let err = repo.complete(record.id, &malicious()).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::AlreadyCompleted(record.id));
        assert_eq!(repo.get(record.id).await.unwrap(), completed);
    }

    #[tokio::test]
    async fn test_completed_rows_reject_direct_updates() {
        let repo = repo().await;
        let record = repo.create(&upload("a.pdf", "aa")).await.unwrap();
        repo.complete(record.id, &Verdict::safe()).await.unwrap();
        let result = sqlx::query("UPDATE scans SET original_name = 'renamed.pdf' WHERE id = ?")
            .bind(record.id.get())
            .execute(&repo.pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_completion_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("race.sqlite3")).await.unwrap();
        let repo = Repository::from(&db);
        let record = repo.create(&upload("a.pdf", "aa")).await.unwrap();
        let timeout = Verdict::failed(Failure::Timeout, None);
        let safe = Verdict::safe();
        let (safe, timed_out) = tokio::join!(repo.complete(record.id, &safe), repo.complete(record.id, &timeout));
        let (winner, loser) = match (safe, timed_out) {
            (Ok(winner), Err(loser)) | (Err(loser), Ok(winner)) => (winner, loser),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert_eq!(&*loser, &ErrorKind::AlreadyCompleted(record.id));
        assert_eq!(repo.get(record.id).await.unwrap(), winner);
        db.close().await;
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let repo = repo().await;
        let id = RecordId::new(404);
        assert_eq!(&*repo.get(id).await.unwrap_err(), &ErrorKind::RecordNotFound(id));
        assert_eq!(&*repo.complete(id, &Verdict::safe()).await.unwrap_err(), &ErrorKind::RecordNotFound(id));
    }

    #[rstest]
    #[case::pending(Verdict { classification: Classification::Pending, ..Verdict::safe() })]
    #[case::malicious_without_detections(Verdict { classification: Classification::Malicious, ..Verdict::safe() })]
    #[case::error_without_failure(Verdict { classification: Classification::Error, ..Verdict::safe() })]
    #[tokio::test]
    async fn test_complete_rejects_invalid_verdicts(#[case] verdict: Verdict) {
        let repo = repo().await;
        let record = repo.create(&upload("a.pdf", "aa")).await.unwrap();
        let err = repo.complete(record.id, &verdict).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::Constraint("verdict"));
        assert_eq!(repo.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_create_completed() {
        let repo = repo().await;
        let verdict = Verdict::failed(Failure::Rejected, Some("The file is empty".to_string()));
        let record = repo.create_completed(&upload("a.pdf", "aa"), &verdict).await.unwrap();
        assert_eq!(record.classification, Classification::Error);
        assert_eq!(record.failure, Some(Failure::Rejected));
        assert_eq!(record.failure_message.as_deref(), Some("The file is empty"));
        assert_eq!(record.completed_at, Some(record.submitted_at));
        let err = repo.complete(record.id, &Verdict::safe()).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::AlreadyCompleted(record.id));
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let repo = repo().await;
        let mut ids = Vec::new();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            ids.push(repo.create(&upload(name, name)).await.unwrap().id);
        }
        // Older submission time, inserted last.
        sqlx::query("UPDATE scans SET submitted_at = submitted_at - 60 WHERE id = ?")
            .bind(ids[2].get())
            .execute(&repo.pool)
            .await
            .unwrap();
        let listed: Vec<_> = repo.list_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![ids[1], ids[0], ids[2]]);
        let limited: Vec<_> = repo.list(Some(1)).await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(limited, vec![ids[1]]);
    }

    #[tokio::test]
    async fn test_find_by_content_hash() {
        let repo = repo().await;
        let first = repo.create(&upload("a.pdf", "same")).await.unwrap();
        repo.create(&upload("b.pdf", "other")).await.unwrap();
        let second = repo.create(&upload("renamed.pdf", "same")).await.unwrap();
        let found: Vec<_> = repo.find_by_content_hash("same").await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(found, vec![second.id, first.id]);
        assert!(repo.find_by_content_hash("missing").await.unwrap().is_empty());
    }
}

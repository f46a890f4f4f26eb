use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::tracker::{Status, TrackerRecord};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("a record with fingerprint {fingerprint} already exists")]
    DuplicateKey { fingerprint: String },

    #[error("no record with fingerprint {fingerprint}")]
    NotFound { fingerprint: String },

    #[error("tracker database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("tracker data is corrupt: {0}")]
    Corrupt(String),
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS applications (
        fingerprint                TEXT PRIMARY KEY NOT NULL,
        canonical_url              TEXT,
        source_mode                TEXT NOT NULL,
        company                    TEXT NOT NULL,
        role_title                 TEXT NOT NULL,
        location                   TEXT,
        status                     TEXT NOT NULL,
        first_seen_at              TEXT NOT NULL,
        last_attempt_at            TEXT,
        submitted_at               TEXT,
        resume_artifact_path       TEXT,
        cover_letter_artifact_path TEXT,
        proof_text                 TEXT,
        proof_screenshot_path      TEXT,
        override_duplicate         INTEGER NOT NULL DEFAULT 0,
        override_reason            TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_applications_status ON applications (status)",
    "CREATE INDEX IF NOT EXISTS idx_applications_first_seen_at ON applications (first_seen_at)",
    "CREATE INDEX IF NOT EXISTS idx_applications_canonical_url ON applications (canonical_url)",
];

/// Durable repository of application records keyed by fingerprint.
///
/// Holds the process's single tracker connection. Cloning shares it.
#[derive(Clone)]
pub struct TrackerStore {
    pool: SqlitePool,
}

impl TrackerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the schema if absent. Safe to call on every startup.
    pub async fn initialize(&self) -> Result<(), TrackerError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!("Tracker schema ready");
        Ok(())
    }

    /// Inserts a new record. Fails with `DuplicateKey` if the fingerprint is
    /// already present; the existing row is left untouched.
    pub async fn insert(&self, record: &TrackerRecord) -> Result<(), TrackerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO applications
                (fingerprint, canonical_url, source_mode, company, role_title, location,
                 status, first_seen_at, last_attempt_at, submitted_at,
                 resume_artifact_path, cover_letter_artifact_path,
                 proof_text, proof_screenshot_path, override_duplicate, override_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.fingerprint)
        .bind(&record.canonical_url)
        .bind(record.source_mode.as_str())
        .bind(&record.company)
        .bind(&record.role_title)
        .bind(&record.location)
        .bind(record.status.as_str())
        .bind(record.first_seen_at)
        .bind(record.last_attempt_at)
        .bind(record.submitted_at)
        .bind(&record.resume_artifact_path)
        .bind(&record.cover_letter_artifact_path)
        .bind(&record.proof_text)
        .bind(&record.proof_screenshot_path)
        .bind(record.override_duplicate)
        .bind(&record.override_reason)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!("Inserted tracker record {}", record.fingerprint);
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(TrackerError::DuplicateKey {
                    fingerprint: record.fingerprint.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<TrackerRecord>, TrackerError> {
        Ok(
            sqlx::query_as::<_, TrackerRecord>(
                "SELECT * FROM applications WHERE fingerprint = ?",
            )
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?,
        )
    }

    /// Oldest record carrying this canonical URL, if any.
    pub async fn get_by_url(
        &self,
        canonical_url: &str,
    ) -> Result<Option<TrackerRecord>, TrackerError> {
        Ok(sqlx::query_as::<_, TrackerRecord>(
            r#"
            SELECT * FROM applications
            WHERE canonical_url = ?
            ORDER BY first_seen_at ASC, rowid ASC
            LIMIT 1
            "#,
        )
        .bind(canonical_url)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Sets the status and stamps `last_attempt_at`. Moving to `Submitted`
    /// also stamps `submitted_at` unless it is already set; no other status
    /// ever clears it.
    pub async fn update_status(&self, fingerprint: &str, status: Status) -> Result<(), TrackerError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET status = ?,
                last_attempt_at = ?,
                submitted_at = CASE WHEN ? = 'SUBMITTED' THEN COALESCE(submitted_at, ?)
                                    ELSE submitted_at END
            WHERE fingerprint = ?
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(status.as_str())
        .bind(now)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected(), fingerprint)?;
        debug!("Tracker record {fingerprint} -> {status}");
        Ok(())
    }

    /// Writes whichever proof fields are provided; `None` leaves a field as is.
    pub async fn update_proof(
        &self,
        fingerprint: &str,
        text: Option<&str>,
        screenshot_path: Option<&str>,
    ) -> Result<(), TrackerError> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET proof_text = COALESCE(?, proof_text),
                proof_screenshot_path = COALESCE(?, proof_screenshot_path)
            WHERE fingerprint = ?
            "#,
        )
        .bind(text)
        .bind(screenshot_path)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected(), fingerprint)
    }

    /// Writes whichever artifact paths are provided; `None` leaves a field as is.
    pub async fn update_artifacts(
        &self,
        fingerprint: &str,
        resume_path: Option<&str>,
        cover_letter_path: Option<&str>,
    ) -> Result<(), TrackerError> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET resume_artifact_path = COALESCE(?, resume_artifact_path),
                cover_letter_artifact_path = COALESCE(?, cover_letter_artifact_path)
            WHERE fingerprint = ?
            "#,
        )
        .bind(resume_path)
        .bind(cover_letter_path)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected(), fingerprint)
    }

    /// Marks the record as an explicitly overridden duplicate. Status is untouched.
    pub async fn set_override(
        &self,
        fingerprint: &str,
        reason: Option<&str>,
    ) -> Result<(), TrackerError> {
        let result = sqlx::query(
            "UPDATE applications SET override_duplicate = 1, override_reason = ? WHERE fingerprint = ?",
        )
        .bind(reason)
        .bind(fingerprint)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected(), fingerprint)
    }

    /// Most recently first-seen records, newest first.
    pub async fn list_recent(
        &self,
        limit: u32,
        status_filter: Option<Status>,
    ) -> Result<Vec<TrackerRecord>, TrackerError> {
        let records = match status_filter {
            Some(status) => {
                sqlx::query_as::<_, TrackerRecord>(
                    r#"
                    SELECT * FROM applications
                    WHERE status = ?
                    ORDER BY first_seen_at DESC, rowid DESC
                    LIMIT ?
                    "#,
                )
                .bind(status.as_str())
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, TrackerRecord>(
                    "SELECT * FROM applications ORDER BY first_seen_at DESC, rowid DESC LIMIT ?",
                )
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(records)
    }

    /// Record count per status. Every status is present, zero-filled.
    pub async fn get_status_counts(&self) -> Result<BTreeMap<Status, u64>, TrackerError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM applications GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts: BTreeMap<Status, u64> = Status::ALL.iter().map(|s| (*s, 0)).collect();
        for (raw, count) in rows {
            let status = raw
                .parse::<Status>()
                .map_err(|e| TrackerError::Corrupt(format!("status column: {e}")))?;
            counts.insert(status, u64::try_from(count).unwrap_or(0));
        }
        Ok(counts)
    }
}

fn ensure_found(rows_affected: u64, fingerprint: &str) -> Result<(), TrackerError> {
    if rows_affected == 0 {
        return Err(TrackerError::NotFound {
            fingerprint: fingerprint.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_memory_pool, create_pool};
    use crate::models::tracker::SourceMode;

    async fn store() -> TrackerStore {
        let store = TrackerStore::new(create_memory_pool().await.unwrap());
        store.initialize().await.unwrap();
        store
    }

    fn record(fingerprint: &str, url: &str) -> TrackerRecord {
        TrackerRecord::new(
            fingerprint.to_string(),
            Some(url.to_string()),
            SourceMode::Autonomous,
            "Acme",
            "Rust Engineer",
            Some("Remote"),
        )
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = store().await;
        store.insert(&record("fp-1", "https://a.com/1")).await.unwrap();
        store.initialize().await.unwrap();
        assert!(store.get_by_fingerprint("fp-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insert_then_fetch_by_fingerprint_and_url() {
        let store = store().await;
        let original = record("fp-1", "https://a.com/1");
        store.insert(&original).await.unwrap();

        let by_fp = store.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert_eq!(by_fp.company, "Acme");
        assert_eq!(by_fp.status, Status::New);
        assert_eq!(by_fp.source_mode, SourceMode::Autonomous);
        assert_eq!(by_fp.location.as_deref(), Some("Remote"));
        assert_eq!(
            by_fp.first_seen_at.timestamp_millis(),
            original.first_seen_at.timestamp_millis()
        );

        let by_url = store.get_by_url("https://a.com/1").await.unwrap().unwrap();
        assert_eq!(by_url.fingerprint, "fp-1");
        assert!(store.get_by_url("https://a.com/2").await.unwrap().is_none());
        assert!(store.get_by_fingerprint("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_fails_and_preserves_existing() {
        let store = store().await;
        store.insert(&record("fp-1", "https://a.com/1")).await.unwrap();

        let mut clash = record("fp-1", "https://other.com/9");
        clash.company = "Other".to_string();
        let err = store.insert(&clash).await.unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateKey { ref fingerprint } if fingerprint == "fp-1"));

        let kept = store.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert_eq!(kept.company, "Acme");
        assert_eq!(kept.canonical_url.as_deref(), Some("https://a.com/1"));
    }

    #[tokio::test]
    async fn test_submitted_at_is_stamped_and_never_cleared() {
        let store = store().await;
        store.insert(&record("fp-1", "https://a.com/1")).await.unwrap();

        store.update_status("fp-1", Status::InProgress).await.unwrap();
        let in_progress = store.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert!(in_progress.last_attempt_at.is_some());
        assert!(in_progress.submitted_at.is_none());

        store.update_status("fp-1", Status::Submitted).await.unwrap();
        let submitted = store.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        let stamped = submitted.submitted_at.expect("submitted_at set");

        store.update_status("fp-1", Status::Failed).await.unwrap();
        let failed = store.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert_eq!(failed.status, Status::Failed);
        assert_eq!(failed.submitted_at, Some(stamped));
        assert!(failed.last_attempt_at.unwrap() >= stamped);
    }

    #[tokio::test]
    async fn test_update_unknown_fingerprint_is_not_found() {
        let store = store().await;
        let err = store.update_status("ghost", Status::Failed).await.unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { .. }));
        assert!(store.update_proof("ghost", Some("x"), None).await.is_err());
    }

    #[tokio::test]
    async fn test_partial_updates_leave_missing_fields_alone() {
        let store = store().await;
        store.insert(&record("fp-1", "https://a.com/1")).await.unwrap();

        store
            .update_artifacts("fp-1", Some("/out/resume.pdf"), Some("/out/cover.pdf"))
            .await
            .unwrap();
        store.update_artifacts("fp-1", None, Some("/out/cover-v2.pdf")).await.unwrap();
        store.update_proof("fp-1", Some("Application received"), None).await.unwrap();
        store.update_proof("fp-1", None, Some("/out/shot.png")).await.unwrap();

        let r = store.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert_eq!(r.resume_artifact_path.as_deref(), Some("/out/resume.pdf"));
        assert_eq!(r.cover_letter_artifact_path.as_deref(), Some("/out/cover-v2.pdf"));
        assert_eq!(r.proof_text.as_deref(), Some("Application received"));
        assert_eq!(r.proof_screenshot_path.as_deref(), Some("/out/shot.png"));
    }

    #[tokio::test]
    async fn test_set_override_keeps_status() {
        let store = store().await;
        store.insert(&record("fp-1", "https://a.com/1")).await.unwrap();
        store.update_status("fp-1", Status::Submitted).await.unwrap();

        store.set_override("fp-1", Some("reposted with new team")).await.unwrap();
        let r = store.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert!(r.override_duplicate);
        assert_eq!(r.override_reason.as_deref(), Some("reposted with new team"));
        assert_eq!(r.status, Status::Submitted);
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first_and_filters() {
        let store = store().await;
        for i in 1..=4 {
            store
                .insert(&record(&format!("fp-{i}"), &format!("https://a.com/{i}")))
                .await
                .unwrap();
        }
        store.update_status("fp-2", Status::Failed).await.unwrap();
        store.update_status("fp-4", Status::Failed).await.unwrap();

        let recent = store.list_recent(3, None).await.unwrap();
        let fps: Vec<_> = recent.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(fps, vec!["fp-4", "fp-3", "fp-2"]);

        let failed = store.list_recent(10, Some(Status::Failed)).await.unwrap();
        let fps: Vec<_> = failed.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(fps, vec!["fp-4", "fp-2"]);
    }

    #[tokio::test]
    async fn test_status_counts_are_zero_filled() {
        let store = store().await;
        store.insert(&record("fp-1", "https://a.com/1")).await.unwrap();
        store.insert(&record("fp-2", "https://a.com/2")).await.unwrap();
        store.update_status("fp-2", Status::Submitted).await.unwrap();

        let counts = store.get_status_counts().await.unwrap();
        assert_eq!(counts.len(), Status::ALL.len());
        assert_eq!(counts[&Status::New], 1);
        assert_eq!(counts[&Status::Submitted], 1);
        assert_eq!(counts[&Status::Failed], 0);
    }

    #[tokio::test]
    async fn test_records_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracker.db");

        let pool = create_pool(&path).await.unwrap();
        let store = TrackerStore::new(pool.clone());
        store.initialize().await.unwrap();
        store.insert(&record("fp-1", "https://a.com/1")).await.unwrap();
        store.update_status("fp-1", Status::Submitted).await.unwrap();
        pool.close().await;

        let reopened = TrackerStore::new(create_pool(&path).await.unwrap());
        reopened.initialize().await.unwrap();
        let r = reopened.get_by_fingerprint("fp-1").await.unwrap().unwrap();
        assert_eq!(r.status, Status::Submitted);
        assert!(r.submitted_at.is_some());
    }
}

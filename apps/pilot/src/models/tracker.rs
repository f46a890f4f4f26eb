use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Lifecycle status of a tracked application.
///
/// `New` is initial. `Submitted`, `Failed`, `Skipped` and `DuplicateSkipped`
/// are terminal for a given attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    New,
    InProgress,
    Submitted,
    Failed,
    Skipped,
    DuplicateSkipped,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::New,
        Status::InProgress,
        Status::Submitted,
        Status::Failed,
        Status::Skipped,
        Status::DuplicateSkipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::InProgress => "IN_PROGRESS",
            Status::Submitted => "SUBMITTED",
            Status::Failed => "FAILED",
            Status::Skipped => "SKIPPED",
            Status::DuplicateSkipped => "DUPLICATE_SKIPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::New | Status::InProgress)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for Status {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// How a record entered the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    Single,
    Autonomous,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Single => "single",
            SourceMode::Autonomous => "autonomous",
        }
    }
}

impl FromStr for SourceMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(SourceMode::Single),
            "autonomous" => Ok(SourceMode::Autonomous),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// One row per unique job posting ever seen.
///
/// `submitted_at` is set iff `status` has ever reached `Submitted`, and the
/// `override_*` fields are only written when a caller explicitly overrode a
/// duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRecord {
    pub fingerprint: String,
    pub canonical_url: Option<String>,
    pub source_mode: SourceMode,
    pub company: String,
    pub role_title: String,
    pub location: Option<String>,
    pub status: Status,
    pub first_seen_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub resume_artifact_path: Option<String>,
    pub cover_letter_artifact_path: Option<String>,
    pub proof_text: Option<String>,
    pub proof_screenshot_path: Option<String>,
    pub override_duplicate: bool,
    pub override_reason: Option<String>,
}

impl TrackerRecord {
    /// A fresh record in status `New`, first seen now.
    pub fn new(
        fingerprint: String,
        canonical_url: Option<String>,
        source_mode: SourceMode,
        company: &str,
        role_title: &str,
        location: Option<&str>,
    ) -> Self {
        Self {
            fingerprint,
            canonical_url,
            source_mode,
            company: company.to_string(),
            role_title: role_title.to_string(),
            location: location.map(str::to_string),
            status: Status::New,
            first_seen_at: Utc::now(),
            last_attempt_at: None,
            submitted_at: None,
            resume_artifact_path: None,
            cover_letter_artifact_path: None,
            proof_text: None,
            proof_screenshot_path: None,
            override_duplicate: false,
            override_reason: None,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for TrackerRecord {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let source_mode: String = row.try_get("source_mode")?;

        Ok(Self {
            fingerprint: row.try_get("fingerprint")?,
            canonical_url: row.try_get("canonical_url")?,
            source_mode: source_mode.parse().map_err(|e| decode_error("source_mode", e))?,
            company: row.try_get("company")?,
            role_title: row.try_get("role_title")?,
            location: row.try_get("location")?,
            status: status.parse().map_err(|e| decode_error("status", e))?,
            first_seen_at: row.try_get("first_seen_at")?,
            last_attempt_at: row.try_get("last_attempt_at")?,
            submitted_at: row.try_get("submitted_at")?,
            resume_artifact_path: row.try_get("resume_artifact_path")?,
            cover_letter_artifact_path: row.try_get("cover_letter_artifact_path")?,
            proof_text: row.try_get("proof_text")?,
            proof_screenshot_path: row.try_get("proof_screenshot_path")?,
            override_duplicate: row.try_get("override_duplicate")?,
            override_reason: row.try_get("override_reason")?,
        })
    }
}

fn decode_error(column: &str, err: UnknownVariant) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::tracker::Status;

/// How the role is staffed day to day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Remote,
    Hybrid,
    Onsite,
}

/// Structured posting content as produced by the extraction collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobContent {
    pub url: String,
    pub company: String,
    pub role_title: String,
    pub location: Option<String>,
    /// Platform job id when the extractor found one on the page.
    pub job_id: Option<String>,
    pub skills: Vec<String>,
    pub experience_min_years: Option<f32>,
    pub experience_max_years: Option<f32>,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    pub work_type: Option<WorkType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Apply,
    Review,
    Skip,
}

/// Output of the scoring collaborator. `total_score` is in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub total_score: f64,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    pub scorer_backend: String,
}

/// Terminal outcome reported by the execution collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcomeKind {
    Submitted,
    Skipped,
    DuplicateSkipped,
    StoppedBeforeSubmit,
    Failed,
    Blocked,
}

impl RunOutcomeKind {
    pub fn job_status(&self) -> JobStatus {
        match self {
            RunOutcomeKind::Submitted => JobStatus::Completed,
            RunOutcomeKind::Skipped
            | RunOutcomeKind::DuplicateSkipped
            | RunOutcomeKind::StoppedBeforeSubmit => JobStatus::Skipped,
            RunOutcomeKind::Failed | RunOutcomeKind::Blocked => JobStatus::Failed,
        }
    }

    pub fn tracker_status(&self) -> Status {
        match self {
            RunOutcomeKind::Submitted => Status::Submitted,
            RunOutcomeKind::Skipped | RunOutcomeKind::StoppedBeforeSubmit => Status::Skipped,
            RunOutcomeKind::DuplicateSkipped => Status::DuplicateSkipped,
            RunOutcomeKind::Failed | RunOutcomeKind::Blocked => Status::Failed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcomeKind::Submitted => "submitted",
            RunOutcomeKind::Skipped => "skipped",
            RunOutcomeKind::DuplicateSkipped => "duplicate-skipped",
            RunOutcomeKind::StoppedBeforeSubmit => "stopped-before-submit",
            RunOutcomeKind::Failed => "failed",
            RunOutcomeKind::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub kind: RunOutcomeKind,
    pub proof_text: Option<String>,
    pub proof_screenshot_path: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl RunOutcome {
    pub fn new(kind: RunOutcomeKind) -> Self {
        Self {
            kind,
            proof_text: None,
            proof_screenshot_path: None,
            errors: Vec::new(),
        }
    }

    /// Error text recorded on a failed job: the first reported error, or the
    /// outcome label when the executor reported none.
    pub fn failure_message(&self) -> String {
        self.errors
            .first()
            .cloned()
            .unwrap_or_else(|| format!("execution reported {}", self.kind.label()))
    }
}

/// Documents produced by the document-generation collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TailoredArtifacts {
    pub resume_path: Option<String>,
    pub cover_letter_path: Option<String>,
}

/// Per-job state inside a single queue run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Skipped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Skipped => "SKIPPED",
        };
        f.write_str(label)
    }
}

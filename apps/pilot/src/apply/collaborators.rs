//! Interfaces to the external services the core drives.
//!
//! Each is carried as `Arc<dyn Trait>` and injected at construction. Every
//! long-running call receives the run's `CancellationToken`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::job::{FitResult, JobContent, RunOutcome, TailoredArtifacts};
use crate::models::profile::Profile;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Turns a posting URL into structured content. `Ok(None)` means the page
/// could not be read as a job posting.
#[async_trait]
pub trait JobExtractor: Send + Sync {
    async fn extract(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<JobContent>, CollaboratorError>;
}

#[async_trait]
pub trait FitEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        job: &JobContent,
        profile: &Profile,
        cancel: &CancellationToken,
    ) -> Result<FitResult, CollaboratorError>;
}

/// Drives one application attempt end to end and reports how it ended.
#[async_trait]
pub trait ApplicationExecutor: Send + Sync {
    async fn run(&self, url: &str, cancel: &CancellationToken)
        -> Result<RunOutcome, CollaboratorError>;
}

#[async_trait]
pub trait DocumentTailor: Send + Sync {
    async fn tailor(
        &self,
        profile: &Profile,
        job: &JobContent,
        cancel: &CancellationToken,
    ) -> Result<TailoredArtifacts, CollaboratorError>;
}

/// Yes/no gate shown once per batch before anything is executed. A
/// cancellation while waiting interrupts the batch.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, summary: &str, cancel: &CancellationToken) -> bool;
}

/// Confirms everything. For unattended runs.
pub struct AutoConfirm;

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _summary: &str, _cancel: &CancellationToken) -> bool {
        true
    }
}

/// The full set of collaborators a run needs.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn JobExtractor>,
    pub evaluator: Arc<dyn FitEvaluator>,
    pub executor: Arc<dyn ApplicationExecutor>,
    pub tailor: Arc<dyn DocumentTailor>,
    pub confirmer: Arc<dyn Confirmer>,
}

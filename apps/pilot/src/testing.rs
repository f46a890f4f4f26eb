//! Shared fixtures: an in-memory tracker and scripted collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::apply::collaborators::{
    ApplicationExecutor, CollaboratorError, Collaborators, Confirmer, DocumentTailor,
    FitEvaluator, JobExtractor,
};
use crate::autonomous::progress::{ProgressEvent, ProgressSink};
use crate::autonomous::queue::QueuedJob;
use crate::db;
use crate::evaluation::fit_scoring::APPLY_THRESHOLD;
use crate::models::job::{
    FitResult, JobContent, Recommendation, RunOutcome, RunOutcomeKind, TailoredArtifacts,
};
use crate::models::profile::Profile;
use crate::tracker::fingerprint::{compute_fingerprint, extract_job_id};
use crate::tracker::{TrackerService, TrackerStore};

pub const COMPANY: &str = "Acme";
pub const ROLE: &str = "Engineer";

pub async fn tracker() -> TrackerService {
    let pool = db::create_memory_pool().await.unwrap();
    let store = TrackerStore::new(pool);
    store.initialize().await.unwrap();
    TrackerService::new(store)
}

pub fn content_for(url: &str) -> JobContent {
    JobContent {
        url: url.to_string(),
        company: COMPANY.to_string(),
        role_title: ROLE.to_string(),
        ..Default::default()
    }
}

fn recommendation_for(score: f64) -> Recommendation {
    if score >= APPLY_THRESHOLD {
        Recommendation::Apply
    } else {
        Recommendation::Review
    }
}

fn fit(score: f64, recommendation: Recommendation) -> FitResult {
    FitResult {
        total_score: score,
        recommendation,
        matched_skills: Vec::new(),
        missing_skills: Vec::new(),
        scorer_backend: "fake".to_string(),
    }
}

/// A pending queue entry whose fingerprint matches what `create_record`
/// assigns for the same URL.
pub fn queued_job(url: &str, score: f64) -> QueuedJob {
    let job_id = extract_job_id(url);
    let fingerprint = compute_fingerprint(Some(url), job_id.as_deref(), COMPANY, ROLE, None);
    QueuedJob::new(
        url.to_string(),
        1,
        fingerprint,
        Arc::new(content_for(url)),
        Arc::new(fit(score, recommendation_for(score))),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction / scoring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeExtractor {
    empty: HashSet<String>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning_none(mut self, url: &str) -> Self {
        self.empty.insert(url.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobExtractor for FakeExtractor {
    async fn extract(
        &self,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<Option<JobContent>, CollaboratorError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(CollaboratorError::Failed("page timed out".to_string()));
        }
        if self.empty.contains(url) {
            return Ok(None);
        }
        Ok(Some(content_for(url)))
    }
}

pub struct FakeEvaluator {
    default_score: f64,
    scores: HashMap<String, (f64, Recommendation)>,
    failing: HashSet<String>,
}

impl FakeEvaluator {
    pub fn new(default_score: f64) -> Self {
        Self {
            default_score,
            scores: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn with_score(mut self, url: &str, score: f64, recommendation: Recommendation) -> Self {
        self.scores.insert(url.to_string(), (score, recommendation));
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

#[async_trait]
impl FitEvaluator for FakeEvaluator {
    async fn evaluate(
        &self,
        job: &JobContent,
        _profile: &Profile,
        _cancel: &CancellationToken,
    ) -> Result<FitResult, CollaboratorError> {
        if self.failing.contains(&job.url) {
            return Err(CollaboratorError::Failed("scorer unavailable".to_string()));
        }
        let (score, recommendation) = self
            .scores
            .get(&job.url)
            .copied()
            .unwrap_or((self.default_score, recommendation_for(self.default_score)));
        Ok(fit(score, recommendation))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Execution / tailoring / confirmation
// ────────────────────────────────────────────────────────────────────────────

pub enum ExecutorBehavior {
    Outcome(RunOutcome),
    Error(String),
    /// Cancels the run's token partway through and never finishes.
    Interrupt,
}

/// Submits every URL unless scripted otherwise.
#[derive(Default)]
pub struct FakeExecutor {
    behaviors: HashMap<String, ExecutorBehavior>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, behavior: ExecutorBehavior) -> Self {
        self.behaviors.insert(url.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApplicationExecutor for FakeExecutor {
    async fn run(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, CollaboratorError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.behaviors.get(url) {
            Some(ExecutorBehavior::Outcome(outcome)) => Ok(outcome.clone()),
            Some(ExecutorBehavior::Error(message)) => {
                Err(CollaboratorError::Failed(message.clone()))
            }
            Some(ExecutorBehavior::Interrupt) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
                std::future::pending().await
            }
            None => {
                let mut outcome = RunOutcome::new(RunOutcomeKind::Submitted);
                outcome.proof_text = Some(format!("confirmation for {url}"));
                Ok(outcome)
            }
        }
    }
}

#[derive(Default)]
pub struct FakeTailor {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTailor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentTailor for FakeTailor {
    async fn tailor(
        &self,
        _profile: &Profile,
        job: &JobContent,
        _cancel: &CancellationToken,
    ) -> Result<TailoredArtifacts, CollaboratorError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(job.url.clone());
            calls.len()
        };
        if self.failing.contains(&job.url) {
            return Err(CollaboratorError::Failed("template missing".to_string()));
        }
        Ok(TailoredArtifacts {
            resume_path: Some(format!("out/{n}/resume.md")),
            cover_letter_path: Some(format!("out/{n}/cover_letter.md")),
        })
    }
}

pub struct FakeConfirmer {
    answer: bool,
    cancel_while_waiting: bool,
    summaries: Mutex<Vec<String>>,
}

impl FakeConfirmer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            cancel_while_waiting: false,
            summaries: Mutex::new(Vec::new()),
        }
    }

    /// Cancels the run's token while the prompt is open and never answers.
    pub fn cancelling() -> Self {
        Self {
            cancel_while_waiting: true,
            ..Self::new(true)
        }
    }

    pub fn summaries(&self) -> Vec<String> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirmer for FakeConfirmer {
    async fn confirm(&self, summary: &str, cancel: &CancellationToken) -> bool {
        self.summaries.lock().unwrap().push(summary.to_string());
        if self.cancel_while_waiting {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
            return std::future::pending().await;
        }
        self.answer
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator set
// ────────────────────────────────────────────────────────────────────────────

/// Default fakes for every seam; override the ones a test inspects.
pub fn collaborators() -> CollaboratorsBuilder {
    CollaboratorsBuilder {
        extractor: Arc::new(FakeExtractor::new()),
        evaluator: Arc::new(FakeEvaluator::new(0.8)),
        executor: Arc::new(FakeExecutor::new()),
        tailor: Arc::new(FakeTailor::new()),
        confirmer: Arc::new(FakeConfirmer::new(true)),
    }
}

pub struct CollaboratorsBuilder {
    extractor: Arc<dyn JobExtractor>,
    evaluator: Arc<dyn FitEvaluator>,
    executor: Arc<dyn ApplicationExecutor>,
    tailor: Arc<dyn DocumentTailor>,
    confirmer: Arc<dyn Confirmer>,
}

impl CollaboratorsBuilder {
    pub fn extractor(mut self, extractor: Arc<dyn JobExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ApplicationExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn tailor(mut self, tailor: Arc<dyn DocumentTailor>) -> Self {
        self.tailor = tailor;
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn build(self) -> Collaborators {
        Collaborators {
            extractor: self.extractor,
            evaluator: self.evaluator,
            executor: self.executor,
            tailor: self.tailor,
            confirmer: self.confirmer,
        }
    }
}

//! Queue Builder: turns validated leads into a ranked, filtered queue.
//!
//! Flow per lead: tracker duplicate check → extract → evaluate → filter.
//! Leads are handled strictly one at a time so at most one expensive
//! extraction or scoring session is open at once.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::apply::collaborators::{FitEvaluator, JobExtractor};
use crate::autonomous::leads::LeadItem;
use crate::config::Config;
use crate::models::job::{FitResult, JobContent, JobStatus, Recommendation};
use crate::models::profile::Profile;
use crate::models::tracker::Status;
use crate::tracker::fingerprint::normalize_url;
use crate::tracker::{TrackerError, TrackerService};

#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    pub min_score: Option<f64>,
    pub include_skips: bool,
}

impl From<&Config> for QueueOptions {
    fn from(config: &Config) -> Self {
        Self {
            min_score: config.min_score,
            include_skips: config.include_skips,
        }
    }
}

/// Snapshot of how the leads were disposed of. Never recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub valid: usize,
    /// Already submitted per the tracker, or repeated earlier in the same list.
    pub duplicates: usize,
    pub extraction_failures: usize,
    pub scoring_failures: usize,
    pub recommended_skip: usize,
    pub below_threshold: usize,
    pub queued: usize,
}

/// A lead accepted into the queue.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub url: String,
    pub line_number: usize,
    pub fingerprint: String,
    pub content: Arc<JobContent>,
    pub fit: Arc<FitResult>,
    pub status: JobStatus,
}

impl QueuedJob {
    pub fn new(
        url: String,
        line_number: usize,
        fingerprint: String,
        content: Arc<JobContent>,
        fit: Arc<FitResult>,
    ) -> Self {
        Self {
            url,
            line_number,
            fingerprint,
            content,
            fit,
            status: JobStatus::Pending,
        }
    }
}

/// Builds the processing queue, sorted by descending fit score. Equal scores
/// keep the order in which their leads appeared.
///
/// Only tracker failures are returned as errors; extraction and scoring
/// failures drop the affected lead. If `cancel` fires, the leads not yet
/// handled are left out and the partial queue is returned.
pub async fn build_queue(
    leads: &[LeadItem],
    tracker: &TrackerService,
    extractor: &dyn JobExtractor,
    evaluator: &dyn FitEvaluator,
    profile: &Profile,
    options: &QueueOptions,
    cancel: &CancellationToken,
) -> Result<(Vec<QueuedJob>, QueueStats), TrackerError> {
    let mut stats = QueueStats {
        total: leads.len(),
        valid: leads.iter().filter(|l| l.valid).count(),
        ..Default::default()
    };

    // Canonical URLs and fingerprints already handled in this build; a
    // repeat of either is never extracted or queued again.
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_fingerprints: HashSet<String> = HashSet::new();
    let mut queue = Vec::new();

    for lead in leads.iter().filter(|l| l.valid) {
        if cancel.is_cancelled() {
            warn!("Queue build cancelled at line {}", lead.line_number);
            break;
        }

        // A URL alone resolves to the job id or canonical URL, the same
        // identity the tracker keys postings on.
        let url_fingerprint = tracker.resolve_fingerprint(Some(&lead.url), "", "", None);
        let new_url = seen_urls.insert(normalize_url(&lead.url));
        let new_fingerprint = seen_fingerprints.insert(url_fingerprint);
        if !(new_url && new_fingerprint) {
            debug!("Line {}: repeat of an earlier lead, skipping", lead.line_number);
            stats.duplicates += 1;
            continue;
        }

        let existing = tracker.check_duplicate(Some(&lead.url), "", "", None).await?;
        if let Some(record) = existing.as_ref().filter(|r| r.status == Status::Submitted) {
            info!(
                "Line {}: already submitted to {} ({}), skipping",
                lead.line_number, record.company, record.role_title
            );
            stats.duplicates += 1;
            continue;
        }

        let content = match extractor.extract(&lead.url, cancel).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                warn!("Line {}: no job content extracted from {}", lead.line_number, lead.url);
                stats.extraction_failures += 1;
                continue;
            }
            Err(e) => {
                warn!("Line {}: extraction failed for {}: {e}", lead.line_number, lead.url);
                stats.extraction_failures += 1;
                continue;
            }
        };

        let fit = match evaluator.evaluate(&content, profile, cancel).await {
            Ok(fit) => fit,
            Err(e) => {
                warn!("Line {}: scoring failed for {}: {e}", lead.line_number, lead.url);
                stats.scoring_failures += 1;
                continue;
            }
        };

        if !(0.0..=1.0).contains(&fit.total_score) {
            warn!(
                "Line {}: scorer returned out-of-range score {} for {}",
                lead.line_number, fit.total_score, lead.url
            );
            stats.scoring_failures += 1;
            continue;
        }

        if fit.recommendation == Recommendation::Skip && !options.include_skips {
            debug!("Line {}: scorer recommends skip", lead.line_number);
            stats.recommended_skip += 1;
            continue;
        }
        if let Some(min_score) = options.min_score {
            if fit.total_score < min_score {
                debug!(
                    "Line {}: score {:.2} below threshold {min_score:.2}",
                    lead.line_number, fit.total_score
                );
                stats.below_threshold += 1;
                continue;
            }
        }

        let fingerprint = match existing {
            Some(record) => record.fingerprint,
            None => tracker.resolve_fingerprint(
                Some(&lead.url),
                &content.company,
                &content.role_title,
                content.location.as_deref(),
            ),
        };

        queue.push(QueuedJob::new(
            lead.url.clone(),
            lead.line_number,
            fingerprint,
            Arc::new(content),
            Arc::new(fit),
        ));
    }

    // `sort_by` is stable: ties keep lead order.
    queue.sort_by(|a, b| b.fit.total_score.total_cmp(&a.fit.total_score));
    stats.queued = queue.len();

    info!(
        "Queue built: {} of {} leads queued ({} duplicates, {} below threshold)",
        stats.queued, stats.total, stats.duplicates, stats.below_threshold
    );
    Ok((queue, stats))
}

//! Fit Scoring: deterministic default `FitEvaluator`.
//!
//! `KeywordFitScorer` needs no remote call and is fully testable. Richer
//! (LLM-backed) evaluators plug in through the same trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::apply::collaborators::{CollaboratorError, FitEvaluator};
use crate::models::job::{FitResult, JobContent, Recommendation};
use crate::models::profile::Profile;

const SKILLS_WEIGHT: f64 = 0.6;
const EXPERIENCE_WEIGHT: f64 = 0.2;
const SALARY_WEIGHT: f64 = 0.1;
const WORK_TYPE_WEIGHT: f64 = 0.1;

pub const APPLY_THRESHOLD: f64 = 0.7;
pub const REVIEW_THRESHOLD: f64 = 0.4;

// ────────────────────────────────────────────────────────────────────────────
// KeywordFitScorer
// ────────────────────────────────────────────────────────────────────────────

/// Keyword and range based scorer.
///
/// Algorithm:
/// 1. Score each dimension present on both the job and the profile:
///    - skills: share of job skills the profile lists (case-insensitive)
///    - experience: 1.0 inside the range, decaying by 0.25 per missing year
///    - salary: 1.0 if the top of the range meets the desired minimum, else
///      the ratio
///    - work type: 1.0 if preferred, else 0.0
/// 2. total = Σ(score × weight) / Σ(weight) over the scored dimensions
/// 3. Recommend: apply (≥ 0.7), review (≥ 0.4), skip
pub struct KeywordFitScorer;

#[async_trait]
impl FitEvaluator for KeywordFitScorer {
    async fn evaluate(
        &self,
        job: &JobContent,
        profile: &Profile,
        _cancel: &CancellationToken,
    ) -> Result<FitResult, CollaboratorError> {
        Ok(compute_fit(job, profile))
    }
}

fn compute_fit(job: &JobContent, profile: &Profile) -> FitResult {
    let mut weighted = 0.0_f64;
    let mut total_weight = 0.0_f64;

    let (matched_skills, missing_skills) = split_skills(job, profile);
    if !job.skills.is_empty() && !profile.skills.is_empty() {
        let share = matched_skills.len() as f64 / job.skills.len() as f64;
        weighted += share * SKILLS_WEIGHT;
        total_weight += SKILLS_WEIGHT;
    }

    if let Some(score) = experience_fit(job, profile) {
        weighted += score * EXPERIENCE_WEIGHT;
        total_weight += EXPERIENCE_WEIGHT;
    }

    if let Some(score) = salary_fit(job, profile) {
        weighted += score * SALARY_WEIGHT;
        total_weight += SALARY_WEIGHT;
    }

    if let Some(work_type) = job.work_type {
        if !profile.preferred_work_types.is_empty() {
            let score = if profile.preferred_work_types.contains(&work_type) {
                1.0
            } else {
                0.0
            };
            weighted += score * WORK_TYPE_WEIGHT;
            total_weight += WORK_TYPE_WEIGHT;
        }
    }

    let total_score = if total_weight > 0.0 {
        (weighted / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    FitResult {
        total_score,
        recommendation: recommend(total_score),
        matched_skills,
        missing_skills,
        scorer_backend: "keyword".to_string(),
    }
}

fn split_skills(job: &JobContent, profile: &Profile) -> (Vec<String>, Vec<String>) {
    let known: Vec<String> = profile.skills.iter().map(|s| s.trim().to_lowercase()).collect();
    job.skills
        .iter()
        .cloned()
        .partition(|skill| known.contains(&skill.trim().to_lowercase()))
}

fn experience_fit(job: &JobContent, profile: &Profile) -> Option<f64> {
    let years = f64::from(profile.years_experience?);
    let min = job.experience_min_years.map(f64::from);
    let max = job.experience_max_years.map(f64::from);
    if min.is_none() && max.is_none() {
        return None;
    }

    let shortfall = min.map(|m| (m - years).max(0.0)).unwrap_or(0.0);
    let excess = max.map(|m| (years - m).max(0.0)).unwrap_or(0.0);
    Some((1.0 - 0.25 * (shortfall + excess)).max(0.0))
}

fn salary_fit(job: &JobContent, profile: &Profile) -> Option<f64> {
    let desired = f64::from(profile.desired_salary_min?);
    let offered = f64::from(job.salary_max.or(job.salary_min)?);
    if desired <= 0.0 || offered >= desired {
        return Some(1.0);
    }
    Some(offered / desired)
}

fn recommend(score: f64) -> Recommendation {
    if score >= APPLY_THRESHOLD {
        Recommendation::Apply
    } else if score >= REVIEW_THRESHOLD {
        Recommendation::Review
    } else {
        Recommendation::Skip
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

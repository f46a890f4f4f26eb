//! Tracker Service: duplicate checks, record creation and status
//! transitions on top of the store.

use tracing::{debug, info};

use crate::models::tracker::{SourceMode, Status, TrackerRecord};
use crate::tracker::fingerprint::{compute_fingerprint, extract_job_id, normalize_url};
use crate::tracker::store::{TrackerError, TrackerStore};

#[derive(Clone)]
pub struct TrackerService {
    store: TrackerStore,
}

impl TrackerService {
    pub fn new(store: TrackerStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TrackerStore {
        &self.store
    }

    /// The fingerprint `create_record` would assign to these inputs.
    pub fn resolve_fingerprint(
        &self,
        url: Option<&str>,
        company: &str,
        role: &str,
        location: Option<&str>,
    ) -> String {
        let job_id = url.and_then(extract_job_id);
        compute_fingerprint(url, job_id.as_deref(), company, role, location)
    }

    /// Existing record for this posting, if any. Read-only.
    ///
    /// Looks up by fingerprint first; when that misses and a URL is given,
    /// falls back to the canonical URL so postings first recorded under a
    /// different identity branch are still found.
    pub async fn check_duplicate(
        &self,
        url: Option<&str>,
        company: &str,
        role: &str,
        location: Option<&str>,
    ) -> Result<Option<TrackerRecord>, TrackerError> {
        let fingerprint = self.resolve_fingerprint(url, company, role, location);
        if let Some(record) = self.store.get_by_fingerprint(&fingerprint).await? {
            debug!("Duplicate check hit on fingerprint {fingerprint}");
            return Ok(Some(record));
        }

        match url {
            Some(url) if !url.trim().is_empty() => {
                let record = self.store.get_by_url(&normalize_url(url)).await?;
                if record.is_some() {
                    debug!("Duplicate check hit on canonical URL for {url}");
                }
                Ok(record)
            }
            _ => Ok(None),
        }
    }

    /// Inserts a `New` record and returns its fingerprint.
    ///
    /// Does not check for duplicates itself. Two callers racing on the same
    /// posting both pass `check_duplicate`; the loser gets `DuplicateKey`.
    pub async fn create_record(
        &self,
        url: Option<&str>,
        company: &str,
        role: &str,
        location: Option<&str>,
        source_mode: SourceMode,
    ) -> Result<String, TrackerError> {
        let fingerprint = self.resolve_fingerprint(url, company, role, location);
        let canonical_url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(normalize_url);

        let record = TrackerRecord::new(
            fingerprint.clone(),
            canonical_url,
            source_mode,
            company,
            role,
            location,
        );
        self.store.insert(&record).await?;

        info!(
            "Tracking {} - {} ({}) as {fingerprint}",
            company,
            role,
            source_mode.as_str()
        );
        Ok(fingerprint)
    }

    pub async fn update_status(&self, fingerprint: &str, status: Status) -> Result<(), TrackerError> {
        self.store.update_status(fingerprint, status).await
    }

    pub async fn update_proof(
        &self,
        fingerprint: &str,
        text: Option<&str>,
        screenshot_path: Option<&str>,
    ) -> Result<(), TrackerError> {
        self.store.update_proof(fingerprint, text, screenshot_path).await
    }

    pub async fn update_artifacts(
        &self,
        fingerprint: &str,
        resume_path: Option<&str>,
        cover_letter_path: Option<&str>,
    ) -> Result<(), TrackerError> {
        self.store
            .update_artifacts(fingerprint, resume_path, cover_letter_path)
            .await
    }

    /// Flags the record as a deliberately overridden duplicate.
    pub async fn record_override(
        &self,
        fingerprint: &str,
        reason: Option<&str>,
    ) -> Result<(), TrackerError> {
        self.store.set_override(fingerprint, reason).await?;
        info!("Duplicate override recorded for {fingerprint}");
        Ok(())
    }

    pub async fn get_record(&self, fingerprint: &str) -> Result<Option<TrackerRecord>, TrackerError> {
        self.store.get_by_fingerprint(fingerprint).await
    }
}

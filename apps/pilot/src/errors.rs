use thiserror::Error;

use crate::autonomous::leads::LeadError;
use crate::tracker::store::TrackerError;

/// Application-level error type.
/// Only operation-wide setup failures end up here; anything attributable to a
/// single lead or job is absorbed into its result object instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Leads error: {0}")]
    Leads(#[from] LeadError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

// Application Identity & Tracking Store.
// Fingerprinting is pure; the store owns persistence; the service owns the
// duplicate and lifecycle rules callers rely on.

pub mod fingerprint;
pub mod service;
pub mod store;

pub use service::TrackerService;
pub use store::{TrackerError, TrackerStore};

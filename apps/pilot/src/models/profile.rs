use serde::{Deserialize, Serialize};

use crate::models::job::WorkType;

/// The applicant profile that jobs are scored and tailored against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub years_experience: Option<f32>,
    /// Minimum acceptable salary, same unit as `JobContent::salary_*`.
    pub desired_salary_min: Option<u32>,
    #[serde(default)]
    pub preferred_work_types: Vec<WorkType>,
}

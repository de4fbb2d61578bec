//! Grade aggregation.
//!
//! Everything in here is a pure function over rows the caller already fetched.
//! Nothing touches the database or the clock, so handlers can call these from
//! anywhere without coordination.

mod average;
mod completion;
mod gpa;
mod report;
mod rollup;
mod scale;

use serde::Serialize;
use std::fmt;

pub use average::{
    has_weighted_grades, simple_average, weighted_subject_average, GradeRecord, Subject,
};
pub use completion::{compute_completion, pending_assessments, AssessmentRoster};
pub use report::{build_performance_summary, build_transcript};
pub use rollup::{score_stats, DEFAULT_ROLLUP_SIZE};
pub use scale::{
    clamp_percentage, map_percentage_to_grade, percentage_of, GradingScale, COARSE_SCALE_NAME,
    FINE_SCALE_NAME,
};

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CalcError {}

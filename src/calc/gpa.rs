use serde::{Deserialize, Serialize};

use super::scale::{clamp_percentage, map_percentage_to_grade, GradingScale};

pub const GPA_MAX: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditedAverage {
    pub average: f64,
    pub credit: f64,
}

/// Transcript GPA: each subject average is mapped through `scale` to a grade
/// point, then points are averaged by credit.
///
/// Subjects with a non-positive credit are skipped. Returns 0 when no credit
/// remains.
pub fn credit_weighted_gpa(subjects: &[CreditedAverage], scale: &GradingScale) -> f64 {
    let mut sum = 0.0_f64;
    let mut credits = 0.0_f64;
    for s in subjects {
        if !(s.credit.is_finite() && s.credit > 0.0) {
            continue;
        }
        let point = map_percentage_to_grade(s.average, scale).grade_point;
        sum += point * s.credit;
        credits += s.credit;
    }
    if credits > 0.0 {
        sum / credits
    } else {
        0.0
    }
}

/// Dashboard GPA: the overall percentage scaled linearly onto [`GPA_MAX`].
///
/// This is a different number from [`credit_weighted_gpa`] for the same
/// student. Both are exposed; callers pick one per view.
pub fn simple_scaled_gpa(overall_percentage: f64) -> f64 {
    clamp_percentage(overall_percentage) / 100.0 * GPA_MAX
}

use serde::{Deserialize, Serialize};

use super::scale::clamp_percentage;

/// One grade row as the aggregator sees it: the percentage is already derived
/// and the weight comes from the owning assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub assessment_id: String,
    pub subject_id: String,
    pub percentage: f64,
    pub weight: f64,
    pub letter_grade: Option<String>,
    pub is_published: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub code: String,
    pub credit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject_id: String,
    pub name: String,
    pub code: String,
    pub credit: f64,
    pub average: f64,
    pub grade_count: usize,
}

fn published(grades: &[GradeRecord]) -> impl Iterator<Item = &GradeRecord> {
    grades.iter().filter(|g| g.is_published)
}

fn counts_toward_weight(g: &GradeRecord) -> bool {
    g.weight.is_finite() && g.weight > 0.0
}

/// True when at least one published grade carries a positive weight, i.e.
/// [`weighted_subject_average`] has something real to report.
pub fn has_weighted_grades(grades: &[GradeRecord]) -> bool {
    published(grades).any(counts_toward_weight)
}

/// `Σ(percentage·weight) / Σ(weight)` over published grades.
///
/// Non-positive weights contribute nothing. Returns 0 when there is nothing to
/// average or the weights sum to zero.
pub fn weighted_subject_average(grades: &[GradeRecord]) -> f64 {
    let mut sum = 0.0_f64;
    let mut denom = 0.0_f64;
    for g in published(grades) {
        if !counts_toward_weight(g) {
            continue;
        }
        sum += clamp_percentage(g.percentage) * g.weight;
        denom += g.weight;
    }
    if denom > 0.0 {
        sum / denom
    } else {
        0.0
    }
}

/// Plain mean of published percentages, ignoring assessment weight.
///
/// Dashboards use this; it is not a substitute for
/// [`weighted_subject_average`] and the two disagree whenever weights differ.
pub fn simple_average(grades: &[GradeRecord]) -> f64 {
    let mut sum = 0.0_f64;
    let mut count: usize = 0;
    for g in published(grades) {
        sum += clamp_percentage(g.percentage);
        count += 1;
    }
    if count > 0 {
        sum / (count as f64)
    } else {
        0.0
    }
}

/// Weighted average per subject, in `subjects` order. Subjects without a
/// published, positively weighted grade are left out rather than reported as 0.
pub fn subject_averages(grades: &[GradeRecord], subjects: &[Subject]) -> Vec<SubjectAverage> {
    let mut out = Vec::new();
    for s in subjects {
        let rows: Vec<GradeRecord> = published(grades)
            .filter(|g| g.subject_id == s.id)
            .cloned()
            .collect();
        if !has_weighted_grades(&rows) {
            continue;
        }
        out.push(SubjectAverage {
            subject_id: s.id.clone(),
            name: s.name.clone(),
            code: s.code.clone(),
            credit: s.credit,
            average: weighted_subject_average(&rows),
            grade_count: rows.len(),
        });
    }
    out
}

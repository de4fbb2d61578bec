use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::average::{GradeRecord, SubjectAverage};
use super::scale::{map_percentage_to_grade, GradingScale};

pub const DEFAULT_ROLLUP_SIZE: usize = 3;

fn sorted_by_average_desc(subjects: &[SubjectAverage]) -> Vec<SubjectAverage> {
    let mut sorted = subjects.to_vec();
    // `sort_by` is stable; tied averages keep input order.
    sorted.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));
    sorted
}

pub fn strengths(subjects: &[SubjectAverage], n: usize) -> Vec<SubjectAverage> {
    sorted_by_average_desc(subjects).into_iter().take(n).collect()
}

/// Tail of the descending order, reversed so the weakest comes first.
pub fn weaknesses(subjects: &[SubjectAverage], n: usize) -> Vec<SubjectAverage> {
    let sorted = sorted_by_average_desc(subjects);
    let start = sorted.len().saturating_sub(n);
    sorted[start..].iter().rev().cloned().collect()
}

/// Letter histogram over published grade records.
///
/// Letters always come from `scale`. A stored `letter_grade` reflects the
/// scale in effect when the grade was written and is ignored here.
pub fn grade_distribution(grades: &[GradeRecord], scale: &GradingScale) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for g in grades.iter().filter(|g| g.is_published) {
        let letter = map_percentage_to_grade(g.percentage, scale).letter;
        *counts.entry(letter).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub high: f64,
    pub low: f64,
}

pub fn score_stats(values: &[f64]) -> ScoreStats {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return ScoreStats {
            count: 0,
            mean: 0.0,
            median: 0.0,
            high: 0.0,
            low: 0.0,
        };
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    let median = if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    };
    ScoreStats {
        count: n,
        mean: sorted.iter().sum::<f64>() / (n as f64),
        median,
        high: sorted[n - 1],
        low: sorted[0],
    }
}

use serde::Serialize;
use std::collections::BTreeMap;

use super::average::{simple_average, subject_averages, GradeRecord, Subject, SubjectAverage};
use super::gpa::{credit_weighted_gpa, simple_scaled_gpa, CreditedAverage};
use super::rollup::{grade_distribution, strengths, weaknesses};
use super::scale::GradingScale;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject_id: String,
    pub name: String,
    pub code: String,
    pub credit: f64,
    pub average: f64,
    pub letter: String,
    pub grade_point: f64,
    pub grade_count: usize,
}

fn subject_results(averages: &[SubjectAverage], scale: &GradingScale) -> Vec<SubjectResult> {
    averages
        .iter()
        .map(|a| {
            let grade = scale.map(a.average);
            SubjectResult {
                subject_id: a.subject_id.clone(),
                name: a.name.clone(),
                code: a.code.clone(),
                credit: a.credit,
                average: a.average,
                letter: grade.letter,
                grade_point: grade.grade_point,
                grade_count: a.grade_count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub scale: String,
    pub subjects: Vec<SubjectResult>,
    pub total_credits: f64,
    pub gpa: f64,
}

pub fn build_transcript(
    grades: &[GradeRecord],
    subjects: &[Subject],
    scale: &GradingScale,
) -> Transcript {
    let averages = subject_averages(grades, subjects);
    let credited: Vec<CreditedAverage> = averages
        .iter()
        .map(|a| CreditedAverage {
            average: a.average,
            credit: a.credit,
        })
        .collect();
    let total_credits = averages
        .iter()
        .filter(|a| a.credit.is_finite() && a.credit > 0.0)
        .map(|a| a.credit)
        .sum();
    Transcript {
        scale: scale.name().to_string(),
        subjects: subject_results(&averages, scale),
        total_credits,
        gpa: credit_weighted_gpa(&credited, scale),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub scale: String,
    pub overall_average: f64,
    pub gpa: f64,
    pub graded_count: usize,
    pub subjects: Vec<SubjectResult>,
    pub strengths: Vec<SubjectAverage>,
    pub weaknesses: Vec<SubjectAverage>,
    pub distribution: BTreeMap<String, usize>,
}

/// Dashboard view: the overall figure is the unweighted mean of every
/// published grade and the GPA is that mean scaled onto 4.0.
pub fn build_performance_summary(
    grades: &[GradeRecord],
    subjects: &[Subject],
    scale: &GradingScale,
    rollup_size: usize,
) -> PerformanceSummary {
    let averages = subject_averages(grades, subjects);
    let overall_average = simple_average(grades);
    PerformanceSummary {
        scale: scale.name().to_string(),
        overall_average,
        gpa: simple_scaled_gpa(overall_average),
        graded_count: grades.iter().filter(|g| g.is_published).count(),
        subjects: subject_results(&averages, scale),
        strengths: strengths(&averages, rollup_size),
        weaknesses: weaknesses(&averages, rollup_size),
        distribution: grade_distribution(grades, scale),
    }
}

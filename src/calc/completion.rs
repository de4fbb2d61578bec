use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Complete,
    NotStarted,
    InProgress,
}

impl CompletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionStatus::Complete => "complete",
            CompletionStatus::NotStarted => "not_started",
            CompletionStatus::InProgress => "in_progress",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub assessment_id: String,
    pub total: usize,
    pub graded: usize,
    pub pending: usize,
    pub status: CompletionStatus,
}

/// Graded students outside the enrolled set are ignored.
pub fn compute_completion<T>(
    assessment_id: &str,
    enrolled: &HashSet<T>,
    graded: &HashSet<T>,
) -> Completion
where
    T: Eq + Hash,
{
    let total = enrolled.len();
    let graded_count = graded.intersection(enrolled).count();
    let pending = total - graded_count;
    let status = if pending == 0 {
        CompletionStatus::Complete
    } else if pending == total {
        CompletionStatus::NotStarted
    } else {
        CompletionStatus::InProgress
    };
    Completion {
        assessment_id: assessment_id.to_string(),
        total,
        graded: graded_count,
        pending,
        status,
    }
}

#[derive(Debug, Clone)]
pub struct AssessmentRoster {
    pub assessment_id: String,
    pub title: String,
    pub class_id: String,
    pub subject_id: String,
    pub enrolled: HashSet<String>,
    pub graded: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAssessment {
    pub title: String,
    pub class_id: String,
    pub subject_id: String,
    #[serde(flatten)]
    pub completion: Completion,
}

/// Assessments that still need grading, most outstanding first.
///
/// Fully graded assessments are dropped. Equal pending counts keep their
/// input order.
pub fn pending_assessments(rosters: &[AssessmentRoster]) -> Vec<PendingAssessment> {
    let mut out: Vec<PendingAssessment> = rosters
        .iter()
        .map(|r| PendingAssessment {
            title: r.title.clone(),
            class_id: r.class_id.clone(),
            subject_id: r.subject_id.clone(),
            completion: compute_completion(&r.assessment_id, &r.enrolled, &r.graded),
        })
        .filter(|p| p.completion.pending > 0)
        .collect();
    out.sort_by(|a, b| b.completion.pending.cmp(&a.completion.pending));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(prefix: &str, n: usize) -> HashSet<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn roster(assessment_id: &str, enrolled: usize, graded: usize) -> AssessmentRoster {
        AssessmentRoster {
            assessment_id: assessment_id.to_string(),
            title: assessment_id.to_uppercase(),
            class_id: "c1".to_string(),
            subject_id: "s1".to_string(),
            enrolled: ids("stu", enrolled),
            graded: ids("stu", graded),
        }
    }

    #[test]
    fn status_transitions_follow_pending_count() {
        let enrolled = ids("s", 30);

        let none = compute_completion("a", &enrolled, &HashSet::new());
        assert_eq!(none.status, CompletionStatus::NotStarted);
        assert_eq!(none.pending, 30);

        let all = compute_completion("a", &enrolled, &ids("s", 30));
        assert_eq!(all.status, CompletionStatus::Complete);
        assert_eq!(all.pending, 0);

        let half = compute_completion("a", &enrolled, &ids("s", 15));
        assert_eq!(half.status, CompletionStatus::InProgress);
        assert_eq!(half.graded, 15);
        assert_eq!(half.pending, 15);
    }

    #[test]
    fn graded_outside_roster_is_not_counted() {
        let enrolled = ids("s", 3);
        let mut graded = ids("s", 1);
        graded.insert("withdrawn".to_string());
        let c = compute_completion("a", &enrolled, &graded);
        assert_eq!(c.graded, 1);
        assert_eq!(c.pending, 2);
    }

    #[test]
    fn empty_roster_counts_as_complete() {
        let c = compute_completion::<String>("a", &HashSet::new(), &HashSet::new());
        assert_eq!(c.total, 0);
        assert_eq!(c.status, CompletionStatus::Complete);
    }

    #[test]
    fn pending_list_drops_complete_and_sorts_descending() {
        let rosters = vec![roster("done", 12, 12), roster("half", 12, 7), roster("fresh", 12, 0)];
        let pending = pending_assessments(&rosters);
        assert_eq!(pending.len(), 2);
        let counts: Vec<usize> = pending.iter().map(|p| p.completion.pending).collect();
        assert_eq!(counts, vec![12, 5]);
        assert_eq!(pending[0].completion.assessment_id, "fresh");
    }

    #[test]
    fn pending_ties_keep_input_order() {
        let rosters = vec![roster("x", 4, 1), roster("y", 4, 1), roster("z", 5, 0)];
        let order: Vec<String> = pending_assessments(&rosters)
            .into_iter()
            .map(|p| p.completion.assessment_id)
            .collect();
        assert_eq!(order, vec!["z", "x", "y"]);
    }

    #[test]
    fn status_serializes_snake_case() {
        let v = serde_json::to_value(CompletionStatus::NotStarted).expect("serialize");
        assert_eq!(v, serde_json::json!("not_started"));
        assert_eq!(CompletionStatus::InProgress.as_str(), "in_progress");
    }
}

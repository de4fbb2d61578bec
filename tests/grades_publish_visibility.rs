mod test_support;

use serde_json::json;
use test_support::Session;

fn subject_average(s: &mut Session, student_id: &str, subject_id: &str) -> serde_json::Value {
    s.ok(
        "analytics.subjectAverage",
        json!({ "studentId": student_id, "subjectId": subject_id }),
    )
}

#[test]
fn drafts_stay_out_of_averages_until_published() {
    let mut s = Session::open("gradebook-publish-visibility");
    let class_id = s.create_class("8A");
    let ada = s.create_student(&class_id, "Lovelace", "Ada");
    let alan = s.create_student(&class_id, "Turing", "Alan");
    let math = s.create_subject("Mathematics", "MTH", 4.0);
    let quiz = s.create_assessment(&class_id, &math, "Quiz 1", 50.0, 100.0);

    let recorded = s.grade(&quiz, &ada, 45.0);
    assert_eq!(recorded.get("percentage").and_then(|v| v.as_f64()), Some(90.0));
    assert_eq!(recorded.get("letterGrade").and_then(|v| v.as_str()), Some("A"));
    assert_eq!(recorded.get("isPublished").and_then(|v| v.as_bool()), Some(false));

    let before = subject_average(&mut s, &ada, &math);
    assert_eq!(before.get("gradeCount").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(before.get("weightedAverage").and_then(|v| v.as_f64()), Some(0.0));

    let published = s.publish(&quiz);
    assert_eq!(published.get("published").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(published.get("notify"), Some(&json!([ada.clone()])));
    assert!(published.get("publishedAt").and_then(|v| v.as_str()).is_some());

    let after = subject_average(&mut s, &ada, &math);
    assert_eq!(after.get("gradeCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(after.get("weightedAverage").and_then(|v| v.as_f64()), Some(90.0));
    assert_eq!(after.get("letter").and_then(|v| v.as_str()), Some("A"));

    // Alan has nothing on file.
    let empty = subject_average(&mut s, &alan, &math);
    assert_eq!(empty.get("gradeCount").and_then(|v| v.as_u64()), Some(0));
}

#[test]
fn editing_a_published_grade_returns_it_to_draft() {
    let mut s = Session::open("gradebook-publish-edit");
    let class_id = s.create_class("8B");
    let ada = s.create_student(&class_id, "Lovelace", "Ada");
    let math = s.create_subject("Mathematics", "MTH", 4.0);
    let quiz = s.create_assessment(&class_id, &math, "Quiz 1", 50.0, 100.0);

    s.grade(&quiz, &ada, 45.0);
    s.publish(&quiz);

    let edited = s.grade(&quiz, &ada, 40.0);
    assert_eq!(edited.get("isPublished").and_then(|v| v.as_bool()), Some(false));
    let assessments = s.ok("assessments.list", json!({ "classId": class_id }));
    assert_eq!(
        assessments
            .pointer("/assessments/0/isPublished")
            .and_then(|v| v.as_bool()),
        Some(false)
    );

    let listed = s.ok("grades.list", json!({ "assessmentId": quiz }));
    let rows = listed.get("grades").and_then(|v| v.as_array()).expect("grades");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("isPublished").and_then(|v| v.as_bool()), Some(false));
    assert!(rows[0].get("publishedAt").is_some_and(|v| v.is_null()));
    assert_eq!(rows[0].get("percentage").and_then(|v| v.as_f64()), Some(80.0));

    let hidden = subject_average(&mut s, &ada, &math);
    assert_eq!(hidden.get("gradeCount").and_then(|v| v.as_u64()), Some(0));

    let republished = s.publish(&quiz);
    assert_eq!(republished.get("notify"), Some(&json!([ada.clone()])));
    let assessments = s.ok("assessments.list", json!({ "classId": class_id }));
    assert_eq!(
        assessments
            .pointer("/assessments/0/isPublished")
            .and_then(|v| v.as_bool()),
        Some(true)
    );
    let shown = subject_average(&mut s, &ada, &math);
    assert_eq!(shown.get("weightedAverage").and_then(|v| v.as_f64()), Some(80.0));
    assert_eq!(shown.get("letter").and_then(|v| v.as_str()), Some("B"));

    let again = s.publish(&quiz);
    assert_eq!(again.get("published").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(again.get("notify"), Some(&json!([])));
}

#[test]
fn publish_unknown_assessment_is_not_found() {
    let mut s = Session::open("gradebook-publish-missing");
    let code = s.err_code("grades.publish", json!({ "assessmentId": "missing" }));
    assert_eq!(code, "not_found");
}

mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{request, spawn_sidecar, str_field, temp_dir, Session};

#[test]
fn every_registered_method_is_routed() {
    let mut s = Session::open("gradebook-router-smoke");
    let class_id = s.create_class("7B");
    let student_id = s.create_student(&class_id, "Lovelace", "Ada");
    let subject_id = s.create_subject("Mathematics", "mth", 4.0);
    let assessment_id = s.create_assessment(&class_id, &subject_id, "Quiz 1", 20.0, 100.0);

    let calls = vec![
        ("health", json!({})),
        ("classes.list", json!({})),
        ("students.list", json!({ "classId": class_id })),
        ("students.setActive", json!({ "studentId": student_id, "active": true })),
        ("subjects.list", json!({})),
        ("assessments.list", json!({ "classId": class_id })),
        (
            "grades.upsert",
            json!({ "assessmentId": assessment_id, "studentId": student_id, "score": 18 }),
        ),
        (
            "grades.bulkUpsert",
            json!({ "assessmentId": assessment_id, "entries": [{ "studentId": student_id, "score": 17 }] }),
        ),
        ("grades.list", json!({ "assessmentId": assessment_id })),
        ("grades.publish", json!({ "assessmentId": assessment_id })),
        ("setup.get", json!({})),
        ("setup.update", json!({ "section": "grading", "patch": { "rollupSize": 2 } })),
        ("scales.list", json!({})),
        ("scales.get", json!({ "name": "fine" })),
        ("scales.map", json!({ "percentage": 85 })),
        (
            "analytics.subjectAverage",
            json!({ "studentId": student_id, "subjectId": subject_id }),
        ),
        ("analytics.student.performance", json!({ "studentId": student_id })),
        ("analytics.student.transcript", json!({ "studentId": student_id })),
        (
            "analytics.class.gradeTable",
            json!({ "classId": class_id, "subjectId": subject_id }),
        ),
        ("analytics.assessment.completion", json!({ "assessmentId": assessment_id })),
        ("analytics.pending", json!({})),
    ];

    for (method, params) in calls {
        let resp = s.call(method, params);
        assert_eq!(
            resp.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            resp
        );
    }

    let code = s.err_code("nope.notAMethod", json!({}));
    assert_eq!(code, "not_implemented");
}

#[test]
fn methods_needing_a_workspace_fail_cleanly_without_one() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));
    assert!(health.pointer("/result/workspacePath").is_some_and(|v| v.is_null()));

    for (id, method) in [("2", "analytics.pending"), ("3", "classes.list")] {
        let resp = request(&mut stdin, &mut reader, id, method, json!({}));
        assert_eq!(
            resp.pointer("/error/code").and_then(|v| v.as_str()),
            Some("no_workspace"),
            "{}",
            method
        );
    }
}

#[test]
fn malformed_line_gets_bad_json_and_the_loop_keeps_going() {
    let workspace = temp_dir("gradebook-router-bad-json");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_json")
    );

    let selected = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let result = selected.get("result").cloned().expect("result");
    assert_eq!(str_field(&result, "workspacePath"), workspace.to_string_lossy());
}

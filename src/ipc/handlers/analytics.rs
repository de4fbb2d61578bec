use crate::calc::{self, GradingScale};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{calc_err, db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, GradingConfig};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

struct ViewContext {
    config: GradingConfig,
    table_scale: GradingScale,
    transcript_scale: GradingScale,
}

fn view_context(conn: &Connection) -> Result<ViewContext, calc::CalcError> {
    let config = settings::load_grading_config(conn)?;
    let table_scale = settings::resolve_scale(conn, &config.table_scale)?;
    let transcript_scale = settings::resolve_scale(conn, &config.transcript_scale)?;
    Ok(ViewContext {
        config,
        table_scale,
        transcript_scale,
    })
}

/// Published grades of a known student; unknown ids are `not_found` rather
/// than an empty report.
fn student_grades(
    conn: &Connection,
    req: &Request,
    student_id: &str,
) -> Result<Vec<calc::GradeRecord>, serde_json::Value> {
    match store::student_exists(conn, student_id) {
        Ok(true) => {}
        Ok(false) => {
            return Err(err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "studentId": student_id })),
            ))
        }
        Err(e) => return Err(calc_err(req, e)),
    }
    store::load_student_grades(conn, student_id)
        .map_err(|e| calc_err(req, e))
}

fn handle_subject_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = match view_context(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let grades: Vec<calc::GradeRecord> = match student_grades(conn, req, &student_id) {
        Ok(v) => v.into_iter().filter(|g| g.subject_id == subject_id).collect(),
        Err(e) => return e,
    };

    let weighted = calc::weighted_subject_average(&grades);
    let simple = calc::simple_average(&grades);
    // Without a weighted grade the 0 above is "no data", not a score to grade.
    let grade = calc::has_weighted_grades(&grades).then(|| ctx.table_scale.map(weighted));
    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "subjectId": subject_id,
            "weightedAverage": weighted,
            "simpleAverage": simple,
            "letter": grade.as_ref().map(|g| g.letter.clone()),
            "gradePoint": grade.as_ref().map(|g| g.grade_point),
            "scale": ctx.table_scale.name(),
            "gradeCount": grades.len()
        }),
    )
}

fn handle_student_performance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = match view_context(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let grades = match student_grades(conn, req, &student_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match store::load_subjects(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };

    let summary = calc::build_performance_summary(
        &grades,
        &subjects,
        &ctx.table_scale,
        ctx.config.rollup_size,
    );
    ok(
        &req.id,
        json!({ "studentId": student_id, "performance": summary }),
    )
}

fn handle_student_transcript(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = match view_context(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let grades = match student_grades(conn, req, &student_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match store::load_subjects(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };

    let transcript = calc::build_transcript(&grades, &subjects, &ctx.transcript_scale);
    ok(
        &req.id,
        json!({ "studentId": student_id, "transcript": transcript }),
    )
}

fn handle_class_grade_table(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let ctx = match view_context(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let students = match store::load_class_students(conn, &class_id) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let by_student = match store::load_class_subject_grades(conn, &class_id, &subject_id) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };

    let mut rows = Vec::new();
    let mut averages = Vec::new();
    for s in students.iter().filter(|s| s.active) {
        let grades = by_student.get(&s.id).map(Vec::as_slice).unwrap_or(&[]);
        if !calc::has_weighted_grades(grades) {
            rows.push(json!({
                "studentId": s.id,
                "displayName": s.display_name,
                "average": serde_json::Value::Null,
                "letter": serde_json::Value::Null,
                "gradeCount": grades.len()
            }));
            continue;
        }
        let average = calc::weighted_subject_average(grades);
        averages.push(average);
        rows.push(json!({
            "studentId": s.id,
            "displayName": s.display_name,
            "average": average,
            "letter": ctx.table_scale.map(average).letter,
            "gradeCount": grades.len()
        }));
    }

    ok(
        &req.id,
        json!({
            "classId": class_id,
            "subjectId": subject_id,
            "scale": ctx.table_scale.name(),
            "rows": rows,
            "stats": calc::score_stats(&averages)
        }),
    )
}

fn handle_assessment_completion(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let roster = match store::load_assessment_roster(conn, &assessment_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "assessment not found", None),
        Err(e) => return calc_err(req, e),
    };
    let completion = calc::compute_completion(&roster.assessment_id, &roster.enrolled, &roster.graded);
    tracing::debug!(%assessment_id, status = completion.status.as_str(), "completion computed");
    ok(&req.id, json!({ "completion": completion }))
}

fn handle_pending(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = optional_str(req, "classId");
    let rosters = match store::load_assessment_rosters(conn, class_id.as_deref()) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let pending = calc::pending_assessments(&rosters);
    let total_pending: usize = pending.iter().map(|p| p.completion.pending).sum();
    ok(
        &req.id,
        json!({
            "classId": class_id,
            "assessments": pending,
            "totalPending": total_pending
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.subjectAverage" => Some(handle_subject_average(state, req)),
        "analytics.student.performance" => Some(handle_student_performance(state, req)),
        "analytics.student.transcript" => Some(handle_student_transcript(state, req)),
        "analytics.class.gradeTable" => Some(handle_class_grade_table(state, req)),
        "analytics.assessment.completion" => Some(handle_assessment_completion(state, req)),
        "analytics.pending" => Some(handle_pending(state, req)),
        _ => None,
    }
}

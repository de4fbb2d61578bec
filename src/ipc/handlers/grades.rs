use crate::calc::{self, GradingScale};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{calc_err, db_conn, now_rfc3339, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::settings;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

const GRADES_BULK_MAX_ENTRIES: usize = 5000;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn db(e: rusqlite::Error) -> Self {
        Self {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }

    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

struct AssessmentMeta {
    class_id: String,
    max_score: f64,
}

fn load_assessment_meta(conn: &Connection, assessment_id: &str) -> Result<AssessmentMeta, HandlerErr> {
    let row: Option<(String, f64)> = conn
        .query_row(
            "SELECT class_id, max_score FROM assessments WHERE id = ?",
            [assessment_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(HandlerErr::db)?;
    let Some((class_id, max_score)) = row else {
        return Err(HandlerErr {
            code: "not_found",
            message: "assessment not found".to_string(),
            details: Some(json!({ "assessmentId": assessment_id })),
        });
    };
    Ok(AssessmentMeta {
        class_id,
        max_score,
    })
}

fn check_score(score: f64, max_score: f64) -> Result<(), HandlerErr> {
    if !score.is_finite() || score < 0.0 {
        return Err(HandlerErr {
            code: "bad_params",
            message: "score must be a non-negative number".to_string(),
            details: Some(json!({ "score": score })),
        });
    }
    if score > max_score {
        return Err(HandlerErr {
            code: "bad_params",
            message: "score exceeds assessment maxScore".to_string(),
            details: Some(json!({ "score": score, "maxScore": max_score })),
        });
    }
    Ok(())
}

struct GradeWrite {
    grade_id: String,
    percentage: f64,
    letter: String,
}

/// Inserts or replaces one student's score. Any write puts the grade back
/// into draft until the assessment is published again.
fn upsert_grade(
    conn: &Connection,
    meta: &AssessmentMeta,
    assessment_id: &str,
    student_id: &str,
    score: f64,
    scale: &GradingScale,
) -> Result<GradeWrite, HandlerErr> {
    check_score(score, meta.max_score)?;

    let student_class: Option<String> = conn
        .query_row(
            "SELECT class_id FROM students WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::db)?;
    match student_class {
        None => {
            return Err(HandlerErr {
                code: "not_found",
                message: "student not found".to_string(),
                details: Some(json!({ "studentId": student_id })),
            })
        }
        Some(c) if c != meta.class_id => {
            return Err(HandlerErr {
                code: "bad_params",
                message: "student is not enrolled in the assessment's class".to_string(),
                details: Some(json!({ "studentId": student_id })),
            })
        }
        Some(_) => {}
    }

    let percentage = calc::percentage_of(score, meta.max_score);
    let letter = scale.map(percentage).letter;
    let new_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO grades(id, student_id, assessment_id, score, percentage, letter_grade, is_published, recorded_at, published_at)
         VALUES(?, ?, ?, ?, ?, ?, 0, ?, NULL)
         ON CONFLICT(student_id, assessment_id) DO UPDATE SET
           score = excluded.score,
           percentage = excluded.percentage,
           letter_grade = excluded.letter_grade,
           is_published = 0,
           recorded_at = excluded.recorded_at,
           published_at = NULL",
        (
            &new_id,
            student_id,
            assessment_id,
            score,
            percentage,
            &letter,
            now_rfc3339(),
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: None,
    })?;

    // The assessment is published only while none of its grades are drafts.
    conn.execute(
        "UPDATE assessments SET is_published = 0 WHERE id = ?",
        [assessment_id],
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: None,
    })?;

    let grade_id: String = conn
        .query_row(
            "SELECT id FROM grades WHERE student_id = ? AND assessment_id = ?",
            (student_id, assessment_id),
            |r| r.get(0),
        )
        .map_err(HandlerErr::db)?;

    Ok(GradeWrite {
        grade_id,
        percentage,
        letter,
    })
}

fn table_scale(conn: &Connection) -> Result<GradingScale, calc::CalcError> {
    let cfg = settings::load_grading_config(conn)?;
    settings::resolve_scale(conn, &cfg.table_scale)
}

fn handle_grades_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let score = match required_f64(req, "score") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scale = match table_scale(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let meta = match load_assessment_meta(conn, &assessment_id) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    match upsert_grade(conn, &meta, &assessment_id, &student_id, score, &scale) {
        Ok(w) => {
            tracing::info!(%assessment_id, %student_id, "grade recorded");
            ok(
                &req.id,
                json!({
                    "gradeId": w.grade_id,
                    "percentage": w.percentage,
                    "letterGrade": w.letter,
                    "isPublished": false
                }),
            )
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_grades_bulk_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(entries) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing entries[]", None);
    };

    if entries.len() > GRADES_BULK_MAX_ENTRIES {
        let rejected = entries.len();
        return ok(
            &req.id,
            json!({
                "updated": 0,
                "rejected": rejected,
                "limitExceeded": true,
                "errors": [{
                    "index": -1,
                    "code": "too_many_entries",
                    "message": format!(
                        "bulk payload exceeds max entries: {} > {}",
                        rejected, GRADES_BULK_MAX_ENTRIES
                    )
                }]
            }),
        );
    }

    let scale = match table_scale(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let meta = match load_assessment_meta(conn, &assessment_id) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let mut updated: usize = 0;
    let mut errors: Vec<serde_json::Value> = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let Some(obj) = entry.as_object() else {
            errors.push(json!({
                "index": i,
                "code": "bad_params",
                "message": format!("entry at index {} must be an object", i),
            }));
            continue;
        };
        let Some(student_id) = obj.get("studentId").and_then(|v| v.as_str()) else {
            errors.push(json!({
                "index": i,
                "code": "bad_params",
                "message": format!("entry at index {} missing studentId", i),
            }));
            continue;
        };
        let Some(score) = obj.get("score").and_then(|v| v.as_f64()) else {
            errors.push(json!({
                "index": i,
                "studentId": student_id,
                "code": "bad_params",
                "message": format!("entry at index {} missing numeric score", i),
            }));
            continue;
        };

        match upsert_grade(&tx, &meta, &assessment_id, student_id, score, &scale) {
            Ok(_) => updated += 1,
            Err(e) => errors.push(json!({
                "index": i,
                "studentId": student_id,
                "code": e.code,
                "message": e.message,
            })),
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    tracing::info!(%assessment_id, updated, rejected = errors.len(), "bulk grades recorded");
    ok(
        &req.id,
        json!({
            "updated": updated,
            "rejected": errors.len(),
            "limitExceeded": false,
            "errors": errors
        }),
    )
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT g.id, g.student_id, s.last_name, s.first_name, g.score, g.percentage,
                g.letter_grade, g.is_published, g.recorded_at, g.published_at
         FROM grades g
         JOIN students s ON s.id = g.student_id
         WHERE g.assessment_id = ?
         ORDER BY s.sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&assessment_id], |r| {
            let id: String = r.get(0)?;
            let student_id: String = r.get(1)?;
            let last: String = r.get(2)?;
            let first: String = r.get(3)?;
            let score: f64 = r.get(4)?;
            let percentage: f64 = r.get(5)?;
            let letter: Option<String> = r.get(6)?;
            let is_published: i64 = r.get(7)?;
            let recorded_at: String = r.get(8)?;
            let published_at: Option<String> = r.get(9)?;
            Ok(json!({
                "id": id,
                "studentId": student_id,
                "displayName": format!("{}, {}", last, first),
                "score": score,
                "percentage": percentage,
                "letterGrade": letter,
                "isPublished": is_published != 0,
                "recordedAt": recorded_at,
                "publishedAt": published_at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(grades) => ok(&req.id, json!({ "grades": grades })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Flips every draft grade of the assessment to published. The students whose
/// grades changed are returned so a dispatcher can notify them and their
/// parents.
fn handle_grades_publish(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = load_assessment_meta(conn, &assessment_id) {
        return e.response(&req.id);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let notify: Vec<String> = {
        let mut stmt = match tx.prepare(
            "SELECT g.student_id
             FROM grades g
             JOIN students s ON s.id = g.student_id
             WHERE g.assessment_id = ? AND g.is_published = 0
             ORDER BY s.sort_order",
        ) {
            Ok(s) => s,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        let rows = stmt
            .query_map([&assessment_id], |r| r.get::<_, String>(0))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>());
        match rows {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    };

    let published_at = now_rfc3339();
    let published = match tx.execute(
        "UPDATE grades SET is_published = 1, published_at = ?
         WHERE assessment_id = ? AND is_published = 0",
        (&published_at, &assessment_id),
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "UPDATE assessments SET is_published = 1 WHERE id = ?",
        [&assessment_id],
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    tracing::info!(%assessment_id, published, "grades published");
    ok(
        &req.id,
        json!({
            "assessmentId": assessment_id,
            "published": published,
            "publishedAt": published_at,
            "notify": notify
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.upsert" => Some(handle_grades_upsert(state, req)),
        "grades.bulkUpsert" => Some(handle_grades_bulk_upsert(state, req)),
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.publish" => Some(handle_grades_publish(state, req)),
        _ => None,
    }
}

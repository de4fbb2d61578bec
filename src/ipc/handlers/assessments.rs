use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_rfc3339, optional_str, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_assessments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = optional_str(req, "subjectId");

    let mut stmt = match conn.prepare(
        "SELECT a.id, a.subject_id, a.title, a.max_score, a.weight, a.is_published, a.sort_order,
                (SELECT COUNT(*) FROM grades g WHERE g.assessment_id = a.id) AS grade_count
         FROM assessments a
         WHERE a.class_id = ?1 AND (?2 IS NULL OR a.subject_id = ?2)
         ORDER BY a.sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map((&class_id, &subject_id), |r| {
            let id: String = r.get(0)?;
            let subject_id: String = r.get(1)?;
            let title: String = r.get(2)?;
            let max_score: f64 = r.get(3)?;
            let weight: f64 = r.get(4)?;
            let is_published: i64 = r.get(5)?;
            let sort_order: i64 = r.get(6)?;
            let grade_count: i64 = r.get(7)?;
            Ok(json!({
                "id": id,
                "subjectId": subject_id,
                "title": title,
                "maxScore": max_score,
                "weight": weight,
                "isPublished": is_published != 0,
                "sortOrder": sort_order,
                "gradeCount": grade_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(assessments) => ok(&req.id, json!({ "assessments": assessments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_assessments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_score = match required_f64(req, "maxScore") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if max_score <= 0.0 {
        return err(
            &req.id,
            "bad_params",
            "maxScore must be > 0",
            Some(json!({ "maxScore": max_score })),
        );
    }
    // Weights are percentages within the subject; they need not sum to 100.
    // Weight 0 keeps the assessment out of weighted averages.
    let weight = match required_f64(req, "weight") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if weight < 0.0 {
        return err(
            &req.id,
            "bad_params",
            "weight must be >= 0",
            Some(json!({ "weight": weight })),
        );
    }

    for (table, id) in [("classes", &class_id), ("subjects", &subject_id)] {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
        let found: Option<i64> = match conn.query_row(&sql, [id], |r| r.get(0)).optional() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if found.is_none() {
            return err(
                &req.id,
                "not_found",
                format!("{} row not found", table),
                Some(json!({ "table": table, "id": id })),
            );
        }
    }

    let next_sort: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM assessments WHERE class_id = ?",
        [&class_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let assessment_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO assessments(id, class_id, subject_id, title, max_score, weight, is_published, sort_order, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 0, ?, ?)",
        (
            &assessment_id,
            &class_id,
            &subject_id,
            &title,
            max_score,
            weight,
            next_sort,
            now_rfc3339(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "assessments" })),
        );
    }

    ok(
        &req.id,
        json!({ "assessmentId": assessment_id, "sortOrder": next_sort }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.list" => Some(handle_assessments_list(state, req)),
        "assessments.create" => Some(handle_assessments_create(state, req)),
        _ => None,
    }
}

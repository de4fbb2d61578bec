use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_rfc3339, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT id, last_name, first_name, student_no, active, sort_order
         FROM students
         WHERE class_id = ?
         ORDER BY sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&class_id], |r| {
            let id: String = r.get(0)?;
            let last: String = r.get(1)?;
            let first: String = r.get(2)?;
            let student_no: Option<String> = r.get(3)?;
            let active: i64 = r.get(4)?;
            let sort_order: i64 = r.get(5)?;
            Ok(json!({
                "id": id,
                "lastName": last,
                "firstName": first,
                "displayName": format!("{}, {}", last, first),
                "studentNo": student_no,
                "active": active != 0,
                "sortOrder": sort_order
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_no = optional_str(req, "studentNo");
    let active = req
        .params
        .get("active")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let class_exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [&class_id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if class_exists.is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }

    let next_sort: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students WHERE class_id = ?",
        [&class_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let student_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, class_id, last_name, first_name, student_no, active, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &class_id,
            &last_name,
            &first_name,
            &student_no,
            if active { 1 } else { 0 },
            next_sort,
            now_rfc3339(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    ok(
        &req.id,
        json!({ "studentId": student_id, "sortOrder": next_sort }),
    )
}

/// Inactive students stay on file but drop out of the grading roster.
fn handle_students_set_active(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(active) = req.params.get("active").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "active must be boolean", None);
    };

    match conn.execute(
        "UPDATE students SET active = ?, updated_at = ? WHERE id = ?",
        (if active { 1 } else { 0 }, now_rfc3339(), &student_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "student not found", None),
        Ok(_) => ok(&req.id, json!({ "studentId": student_id, "active": active })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.setActive" => Some(handle_students_set_active(state, req)),
        _ => None,
    }
}

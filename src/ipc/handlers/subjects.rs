use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{calc_err, db_conn, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use uuid::Uuid;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::load_subjects(conn) {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => calc_err(req, e),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v.to_ascii_uppercase(),
        Err(e) => return e,
    };
    let credit = match required_f64(req, "credit") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if credit <= 0.0 {
        return err(
            &req.id,
            "bad_params",
            "credit must be > 0",
            Some(json!({ "credit": credit })),
        );
    }

    let subject_id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO subjects(id, name, code, credit) VALUES(?, ?, ?, ?)",
        (&subject_id, &name, &code, credit),
    ) {
        Ok(_) => ok(
            &req.id,
            json!({ "subjectId": subject_id, "name": name, "code": code, "credit": credit }),
        ),
        Err(rusqlite::Error::SqliteFailure(f, _))
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            err(
                &req.id,
                "conflict",
                "subject code already exists",
                Some(json!({ "code": code })),
            )
        }
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        _ => None,
    }
}

use crate::calc::{self, GradingScale};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{calc_err, db_conn, required_f64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::settings;
use serde_json::json;

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match settings::load_grading_config(conn) {
        Ok(cfg) => ok(&req.id, json!({ "grading": cfg })),
        Err(e) => calc_err(req, e),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match req.params.get("section").and_then(|v| v.as_str()) {
        Some("grading") => {}
        Some(_) => return err(&req.id, "bad_params", "unknown section", None),
        None => return err(&req.id, "bad_params", "missing section", None),
    }
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut cfg = match settings::load_grading_config(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let known = match settings::scale_names(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    if let Err(msg) = cfg.apply_patch(patch_obj, &known) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = settings::save_grading_config(conn, &cfg) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "grading": cfg }))
}

fn handle_scales_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let custom = match settings::load_custom_scales(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let mut scales: Vec<serde_json::Value> = vec![
        json!({ "name": calc::COARSE_SCALE_NAME, "preset": true, "bandCount": GradingScale::coarse().bands().len() }),
        json!({ "name": calc::FINE_SCALE_NAME, "preset": true, "bandCount": GradingScale::fine().bands().len() }),
    ];
    for s in &custom {
        scales.push(json!({ "name": s.name(), "preset": false, "bandCount": s.bands().len() }));
    }
    ok(&req.id, json!({ "scales": scales }))
}

fn handle_scales_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match settings::resolve_scale(conn, &name) {
        Ok(scale) => ok(&req.id, json!({ "scale": scale })),
        Err(e) => calc_err(req, e),
    }
}

/// Creates or replaces a custom scale. Preset names are reserved.
fn handle_scales_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("scale") else {
        return err(&req.id, "bad_params", "missing scale", None);
    };
    let def: GradingScale = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_scale", e.to_string(), None),
    };
    if GradingScale::is_preset_name(def.name()) {
        return err(
            &req.id,
            "bad_params",
            "preset scale names are reserved",
            Some(json!({ "name": def.name() })),
        );
    }

    let mut custom = match settings::load_custom_scales(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let replaced = match custom.iter_mut().find(|s| s.name() == def.name()) {
        Some(existing) => {
            *existing = def.clone();
            true
        }
        None => {
            custom.push(def.clone());
            false
        }
    };
    if let Err(e) = settings::save_custom_scales(conn, &custom) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(scale = %def.name(), replaced, "grading scale saved");
    ok(&req.id, json!({ "scale": def, "replaced": replaced }))
}

fn handle_scales_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if GradingScale::is_preset_name(&name) {
        return err(&req.id, "bad_params", "preset scales cannot be deleted", None);
    }
    let cfg = match settings::load_grading_config(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    if cfg.table_scale == name || cfg.transcript_scale == name {
        return err(
            &req.id,
            "scale_in_use",
            "scale is selected in grading setup",
            Some(json!({ "name": name })),
        );
    }

    let mut custom = match settings::load_custom_scales(conn) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let before = custom.len();
    custom.retain(|s| s.name() != name);
    if custom.len() == before {
        return err(&req.id, "not_found", "scale not found", None);
    }
    if let Err(e) = settings::save_custom_scales(conn, &custom) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "deleted": name }))
}

fn handle_scales_map(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let percentage = match required_f64(req, "percentage") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match req.params.get("scale").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => match settings::load_grading_config(conn) {
            Ok(cfg) => cfg.table_scale,
            Err(e) => return calc_err(req, e),
        },
    };
    let scale = match settings::resolve_scale(conn, &name) {
        Ok(v) => v,
        Err(e) => return calc_err(req, e),
    };
    let grade = calc::map_percentage_to_grade(percentage, &scale);
    ok(
        &req.id,
        json!({
            "scale": scale.name(),
            "percentage": calc::clamp_percentage(percentage),
            "letter": grade.letter,
            "gradePoint": grade.grade_point
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        "scales.list" => Some(handle_scales_list(state, req)),
        "scales.get" => Some(handle_scales_get(state, req)),
        "scales.save" => Some(handle_scales_save(state, req)),
        "scales.delete" => Some(handle_scales_delete(state, req)),
        "scales.map" => Some(handle_scales_map(state, req)),
        _ => None,
    }
}

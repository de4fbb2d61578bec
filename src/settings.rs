//! Workspace grading settings: which scale each view uses, the rollup size,
//! and any custom grading scales. Stored as JSON in the `settings` table.

use crate::calc::{
    CalcError, GradingScale, COARSE_SCALE_NAME, DEFAULT_ROLLUP_SIZE, FINE_SCALE_NAME,
};
use crate::db;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const GRADING_CONFIG_KEY: &str = "grading.config";
pub const GRADING_SCALES_KEY: &str = "grading.scales";
pub const ROLLUP_SIZE_MAX: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingConfig {
    /// Scale for class grade tables, stored letters and dashboards.
    pub table_scale: String,
    /// Scale for transcripts and credit-weighted GPA.
    pub transcript_scale: String,
    pub rollup_size: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            table_scale: COARSE_SCALE_NAME.to_string(),
            transcript_scale: FINE_SCALE_NAME.to_string(),
            rollup_size: DEFAULT_ROLLUP_SIZE,
        }
    }
}

impl GradingConfig {
    /// Applies a camelCase patch. Unknown fields and unknown scale names are
    /// rejected; nothing is applied on error.
    pub fn apply_patch(
        &mut self,
        patch: &Map<String, Value>,
        known_scales: &[String],
    ) -> Result<(), String> {
        let mut next = self.clone();
        for (k, v) in patch {
            match k.as_str() {
                "tableScale" | "transcriptScale" => {
                    let name = v
                        .as_str()
                        .map(str::trim)
                        .ok_or_else(|| format!("{} must be string", k))?;
                    if !known_scales.iter().any(|s| s == name) {
                        return Err(format!("{} refers to unknown scale: {}", k, name));
                    }
                    if k == "tableScale" {
                        next.table_scale = name.to_string();
                    } else {
                        next.transcript_scale = name.to_string();
                    }
                }
                "rollupSize" => {
                    let n = v
                        .as_u64()
                        .ok_or_else(|| format!("{} must be integer", k))?
                        as usize;
                    if !(1..=ROLLUP_SIZE_MAX).contains(&n) {
                        return Err(format!("{} must be in 1..={}", k, ROLLUP_SIZE_MAX));
                    }
                    next.rollup_size = n;
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            }
        }
        *self = next;
        Ok(())
    }
}

pub fn load_custom_scales(conn: &Connection) -> Result<Vec<GradingScale>, CalcError> {
    let saved = db::settings_get_json(conn, GRADING_SCALES_KEY)
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
    let Some(Value::Array(items)) = saved else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for item in items {
        match serde_json::from_value::<GradingScale>(item) {
            Ok(scale) => out.push(scale),
            Err(e) => tracing::warn!(error = %e, "skipping invalid stored grading scale"),
        }
    }
    Ok(out)
}

pub fn save_custom_scales(conn: &Connection, scales: &[GradingScale]) -> anyhow::Result<()> {
    db::settings_set_json(conn, GRADING_SCALES_KEY, &serde_json::to_value(scales)?)
}

/// Presets first, then custom scales in stored order.
pub fn scale_names(conn: &Connection) -> Result<Vec<String>, CalcError> {
    let mut names = vec![COARSE_SCALE_NAME.to_string(), FINE_SCALE_NAME.to_string()];
    names.extend(load_custom_scales(conn)?.into_iter().map(|s| s.name().to_string()));
    Ok(names)
}

pub fn resolve_scale(conn: &Connection, name: &str) -> Result<GradingScale, CalcError> {
    if let Some(preset) = GradingScale::preset(name) {
        return Ok(preset);
    }
    load_custom_scales(conn)?
        .into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| {
            CalcError::new("not_found", format!("unknown grading scale: {}", name))
                .with_details(serde_json::json!({ "scale": name }))
        })
}

/// Saved values are merged over defaults best-effort; a stale or malformed
/// value falls back to the default instead of blocking reads.
pub fn load_grading_config(conn: &Connection) -> Result<GradingConfig, CalcError> {
    let mut cfg = GradingConfig::default();
    let saved = db::settings_get_json(conn, GRADING_CONFIG_KEY)
        .map_err(|e| CalcError::new("db_query_failed", e.to_string()))?;
    if let Some(saved_obj) = saved.as_ref().and_then(|v| v.as_object()) {
        let known = scale_names(conn)?;
        for (k, v) in saved_obj {
            let mut single = Map::new();
            single.insert(k.clone(), v.clone());
            if let Err(msg) = cfg.apply_patch(&single, &known) {
                tracing::warn!(field = %k, %msg, "ignoring stored grading setting");
            }
        }
    }
    Ok(cfg)
}

pub fn save_grading_config(conn: &Connection, cfg: &GradingConfig) -> anyhow::Result<()> {
    db::settings_set_json(conn, GRADING_CONFIG_KEY, &serde_json::to_value(cfg)?)
}

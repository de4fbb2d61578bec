use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::CalcError;

pub const COARSE_SCALE_NAME: &str = "coarse";
pub const FINE_SCALE_NAME: &str = "fine";

const BAND_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_percentage: f64,
    pub max_percentage: f64,
    pub letter: String,
    pub grade_point: f64,
}

impl GradeBand {
    fn new(min_percentage: f64, max_percentage: f64, letter: &str, grade_point: f64) -> Self {
        Self {
            min_percentage,
            max_percentage,
            letter: letter.to_string(),
            grade_point,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterGrade {
    pub letter: String,
    pub grade_point: f64,
}

/// Wire/storage shape of a scale before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingScaleDef {
    pub name: String,
    pub bands: Vec<GradeBand>,
}

/// Ordered percentage bands, highest threshold first.
///
/// Bands are only reachable through [`GradingScale::new`] (or deserialization,
/// which goes through it), so a scale in hand always covers `[0, 100]` with
/// contiguous, non-overlapping bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GradingScaleDef")]
pub struct GradingScale {
    name: String,
    bands: Vec<GradeBand>,
}

impl TryFrom<GradingScaleDef> for GradingScale {
    type Error = CalcError;

    fn try_from(def: GradingScaleDef) -> Result<Self, Self::Error> {
        GradingScale::new(def.name, def.bands)
    }
}

impl GradingScale {
    pub fn new(name: impl Into<String>, mut bands: Vec<GradeBand>) -> Result<Self, CalcError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(CalcError::new("bad_scale", "scale name must not be empty"));
        }
        if bands.is_empty() {
            return Err(CalcError::new("bad_scale", "scale must have at least one band"));
        }

        for (i, b) in bands.iter_mut().enumerate() {
            b.letter = b.letter.trim().to_string();
            if b.letter.is_empty() {
                return Err(CalcError::new(
                    "bad_scale",
                    format!("band {} has an empty letter", i),
                ));
            }
            if !b.min_percentage.is_finite() || !b.max_percentage.is_finite() {
                return Err(CalcError::new(
                    "bad_scale",
                    format!("band {} bounds must be finite", b.letter),
                ));
            }
            if b.min_percentage >= b.max_percentage {
                return Err(CalcError::new(
                    "bad_scale",
                    format!("band {} must have min < max", b.letter),
                ));
            }
            if !b.grade_point.is_finite() || b.grade_point < 0.0 {
                return Err(CalcError::new(
                    "bad_scale",
                    format!("band {} grade point must be a non-negative number", b.letter),
                ));
            }
        }

        bands.sort_by(|a, b| {
            b.min_percentage
                .partial_cmp(&a.min_percentage)
                .unwrap_or(Ordering::Equal)
        });

        let top = &bands[0];
        if (top.max_percentage - 100.0).abs() > BAND_EPSILON {
            return Err(CalcError::new("bad_scale", "highest band must end at 100"));
        }
        let bottom = &bands[bands.len() - 1];
        if bottom.min_percentage.abs() > BAND_EPSILON {
            return Err(CalcError::new("bad_scale", "lowest band must start at 0"));
        }
        for pair in bands.windows(2) {
            if (pair[0].min_percentage - pair[1].max_percentage).abs() > BAND_EPSILON {
                return Err(CalcError::new(
                    "bad_scale",
                    format!(
                        "bands {} and {} must be contiguous",
                        pair[0].letter, pair[1].letter
                    ),
                )
                .with_details(serde_json::json!({
                    "upper": pair[0].letter,
                    "lower": pair[1].letter,
                })));
            }
        }

        Ok(Self { name, bands })
    }

    /// Five bands: A/B/C/D/F at 90/80/70/60. Used by class grade tables.
    pub fn coarse() -> Self {
        Self {
            name: COARSE_SCALE_NAME.to_string(),
            bands: vec![
                GradeBand::new(90.0, 100.0, "A", 4.0),
                GradeBand::new(80.0, 90.0, "B", 3.0),
                GradeBand::new(70.0, 80.0, "C", 2.0),
                GradeBand::new(60.0, 70.0, "D", 1.0),
                GradeBand::new(0.0, 60.0, "F", 0.0),
            ],
        }
    }

    /// Eleven bands, A+ through F at 5-point steps on a 4.0 scale. Used by transcripts.
    pub fn fine() -> Self {
        Self {
            name: FINE_SCALE_NAME.to_string(),
            bands: vec![
                GradeBand::new(90.0, 100.0, "A+", 4.0),
                GradeBand::new(85.0, 90.0, "A", 3.7),
                GradeBand::new(80.0, 85.0, "A-", 3.3),
                GradeBand::new(75.0, 80.0, "B+", 3.0),
                GradeBand::new(70.0, 75.0, "B", 2.7),
                GradeBand::new(65.0, 70.0, "B-", 2.3),
                GradeBand::new(60.0, 65.0, "C+", 2.0),
                GradeBand::new(55.0, 60.0, "C", 1.7),
                GradeBand::new(50.0, 55.0, "C-", 1.3),
                GradeBand::new(45.0, 50.0, "D", 1.0),
                GradeBand::new(0.0, 45.0, "F", 0.0),
            ],
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            COARSE_SCALE_NAME => Some(Self::coarse()),
            FINE_SCALE_NAME => Some(Self::fine()),
            _ => None,
        }
    }

    pub fn is_preset_name(name: &str) -> bool {
        name == COARSE_SCALE_NAME || name == FINE_SCALE_NAME
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }

    pub fn map(&self, percentage: f64) -> LetterGrade {
        map_percentage_to_grade(percentage, self)
    }
}

/// NaN maps to 0; everything else is pinned into `[0, 100]`.
pub fn clamp_percentage(percentage: f64) -> f64 {
    if percentage.is_nan() {
        0.0
    } else {
        percentage.clamp(0.0, 100.0)
    }
}

pub fn percentage_of(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 && score.is_finite() {
        clamp_percentage(100.0 * score / max_score)
    } else {
        0.0
    }
}

pub fn map_percentage_to_grade(percentage: f64, scale: &GradingScale) -> LetterGrade {
    let p = clamp_percentage(percentage);
    let band = scale
        .bands
        .iter()
        .find(|b| b.min_percentage <= p)
        .or_else(|| scale.bands.last());
    match band {
        Some(b) => LetterGrade {
            letter: b.letter.clone(),
            grade_point: b.grade_point,
        },
        None => LetterGrade {
            letter: String::new(),
            grade_point: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_lower_bounds_are_inclusive() {
        let scale = GradingScale::coarse();
        assert_eq!(map_percentage_to_grade(90.0, &scale).letter, "A");
        assert_eq!(map_percentage_to_grade(89.999, &scale).letter, "B");
        assert_eq!(map_percentage_to_grade(80.0, &scale).letter, "B");
        assert_eq!(map_percentage_to_grade(60.0, &scale).letter, "D");
        assert_eq!(map_percentage_to_grade(59.9, &scale).letter, "F");
        assert_eq!(map_percentage_to_grade(0.0, &scale).letter, "F");
    }

    #[test]
    fn fine_scale_maps_letters_and_points() {
        let scale = GradingScale::fine();
        let a_plus = map_percentage_to_grade(95.0, &scale);
        assert_eq!(a_plus.letter, "A+");
        assert_eq!(a_plus.grade_point, 4.0);
        let b_minus = map_percentage_to_grade(65.0, &scale);
        assert_eq!(b_minus.letter, "B-");
        assert_eq!(b_minus.grade_point, 2.3);
        let f = map_percentage_to_grade(44.99, &scale);
        assert_eq!(f.letter, "F");
        assert_eq!(f.grade_point, 0.0);
        assert_eq!(scale.bands().len(), 11);
    }

    #[test]
    fn out_of_range_percentages_fall_to_boundary_bands() {
        let scale = GradingScale::coarse();
        assert_eq!(map_percentage_to_grade(130.0, &scale).letter, "A");
        assert_eq!(map_percentage_to_grade(-5.0, &scale).letter, "F");
        assert_eq!(map_percentage_to_grade(f64::NAN, &scale).letter, "F");
    }

    #[test]
    fn new_sorts_bands_descending() {
        let scale = GradingScale::new(
            "pass-fail",
            vec![
                GradeBand::new(0.0, 50.0, "FAIL", 0.0),
                GradeBand::new(50.0, 100.0, "PASS", 4.0),
            ],
        )
        .expect("valid scale");
        assert_eq!(scale.bands()[0].letter, "PASS");
        assert_eq!(scale.map(50.0).letter, "PASS");
        assert_eq!(scale.map(49.0).letter, "FAIL");
    }

    #[test]
    fn new_rejects_gaps_and_partial_coverage() {
        let gap = GradingScale::new(
            "gappy",
            vec![
                GradeBand::new(60.0, 100.0, "P", 4.0),
                GradeBand::new(0.0, 50.0, "F", 0.0),
            ],
        )
        .expect_err("gap must be rejected");
        assert_eq!(gap.code, "bad_scale");
        assert!(gap.details.is_some());

        let short = GradingScale::new("short", vec![GradeBand::new(0.0, 90.0, "X", 1.0)])
            .expect_err("must end at 100");
        assert_eq!(short.code, "bad_scale");

        let empty = GradingScale::new("empty", Vec::new()).expect_err("empty");
        assert_eq!(empty.code, "bad_scale");
    }

    #[test]
    fn deserialization_validates() {
        let bad = serde_json::json!({
            "name": "bad",
            "bands": [{ "minPercentage": 10.0, "maxPercentage": 100.0, "letter": "A", "gradePoint": 4.0 }]
        });
        assert!(serde_json::from_value::<GradingScale>(bad).is_err());

        let good = serde_json::to_value(GradingScale::coarse()).expect("serialize");
        let back: GradingScale = serde_json::from_value(good).expect("deserialize");
        assert_eq!(back, GradingScale::coarse());
    }

    #[test]
    fn percentage_of_guards_zero_max_and_clamps() {
        assert_eq!(percentage_of(7.0, 10.0), 70.0);
        assert_eq!(percentage_of(5.0, 0.0), 0.0);
        assert_eq!(percentage_of(12.0, 10.0), 100.0);
    }
}

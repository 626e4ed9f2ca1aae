//! The persisted form of a confirmed measurement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::composition::{BodyType, CompositionProfile, bmi};
use crate::decode::WeightSample;
use crate::util::round_to;

/// Origin tag stored with every reading taken by the scale.
pub const SCALE_ORIGIN: &str = "scale";

/// A confirmed measurement. Built only by the session on confirmation; stores
/// rehydrate it through serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Reading {
    pub profile_id: String,
    pub weight_kg: f32,
    pub bmi: f32,
    pub body_fat_pct: Option<f32>,
    pub water_pct: Option<f32>,
    pub muscle_kg: Option<f32>,
    pub bone_kg: Option<f32>,
    pub bmr_kcal: Option<i32>,
    pub metabolic_age: Option<u8>,
    pub visceral_fat: Option<u8>,
    pub body_type: Option<BodyType>,
    pub impedance_ohm: Option<u16>,
    pub origin: String,
    pub measured_at: DateTime<Utc>,
}

impl Reading {
    pub(crate) fn from_capture(
        profile_id: &str,
        height_cm: f32,
        sample: &WeightSample,
        composition: Option<&CompositionProfile>,
        measured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            weight_kg: round_to(sample.weight_kg, 1),
            bmi: round_to(bmi(sample.weight_kg, height_cm), 2),
            body_fat_pct: composition.map(|c| c.body_fat_pct),
            water_pct: composition.map(|c| c.water_pct),
            muscle_kg: composition.map(|c| c.muscle_kg),
            bone_kg: composition.map(|c| c.bone_kg),
            bmr_kcal: composition.map(|c| c.bmr_kcal),
            metabolic_age: composition.map(|c| c.metabolic_age),
            visceral_fat: composition.map(|c| c.visceral_fat),
            body_type: composition.map(|c| c.body_type),
            impedance_ohm: composition.and(sample.impedance_ohm),
            origin: SCALE_ORIGIN.to_string(),
            measured_at,
        }
    }

    pub fn has_composition(&self) -> bool {
        self.body_fat_pct.is_some()
    }
}

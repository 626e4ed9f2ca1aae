//! Body-composition estimate from weight, bioimpedance and a biometric profile.
//!
//! Every output saturates at its bounds; out-of-range inputs never error.

use serde::{Deserialize, Serialize};

use crate::util::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

/// Estimator inputs describing the person on the scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiometricProfile {
    pub age_years: u32,
    pub height_cm: f32,
    pub sex: Sex,
}

impl Default for BiometricProfile {
    fn default() -> Self {
        Self {
            age_years: 30,
            height_cm: 170.0,
            sex: Sex::Male,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyType {
    VeryLean,
    Athletic,
    Normal,
    Overweight,
    Obese,
}

impl BodyType {
    /// Thresholds on body-fat percent: <6, <14, <21, <30, else obese.
    pub fn from_body_fat(pct: f64) -> Self {
        if pct < 6.0 {
            BodyType::VeryLean
        } else if pct < 14.0 {
            BodyType::Athletic
        } else if pct < 21.0 {
            BodyType::Normal
        } else if pct < 30.0 {
            BodyType::Overweight
        } else {
            BodyType::Obese
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BodyType::VeryLean => "very-lean",
            BodyType::Athletic => "athletic",
            BodyType::Normal => "normal",
            BodyType::Overweight => "overweight",
            BodyType::Obese => "obese",
        }
    }
}

impl core::fmt::Display for BodyType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionProfile {
    pub body_fat_pct: f32,
    pub water_pct: f32,
    pub muscle_kg: f32,
    pub bone_kg: f32,
    pub visceral_fat: u8,
    pub bmr_kcal: i32,
    pub metabolic_age: u8,
    pub body_type: BodyType,
}

pub const FAT_PCT_BOUNDS: (f64, f64) = (5.0, 50.0);
pub const WATER_PCT_BOUNDS: (f64, f64) = (35.0, 75.0);
pub const MUSCLE_FLOOR_KG: f64 = 10.0;
pub const MUSCLE_CEILING_RATIO: f64 = 0.8;
pub const BONE_KG_BOUNDS: (f64, f64) = (0.5, 8.0);
pub const VISCERAL_BOUNDS: (f64, f64) = (1.0, 30.0);
pub const METABOLIC_AGE_BOUNDS: (f64, f64) = (15.0, 80.0);

/// Body-mass index from weight and height.
pub fn bmi(weight_kg: f32, height_cm: f32) -> f32 {
    let h = f64::from(height_cm) / 100.0;
    (f64::from(weight_kg) / (h * h)) as f32
}

fn clamp(v: f64, (lo, hi): (f64, f64)) -> f64 {
    if v.is_nan() { lo } else { v.clamp(lo, hi) }
}

/// Pure estimate. Callers only invoke it when impedance is present and non-zero.
pub fn estimate(weight_kg: f32, impedance_ohm: u16, profile: &BiometricProfile) -> CompositionProfile {
    let w = f64::from(weight_kg);
    let z = f64::from(impedance_ohm);
    let age = f64::from(profile.age_years);
    let height = f64::from(profile.height_cm);
    let male = profile.sex == Sex::Male;
    let bmi = f64::from(bmi(weight_kg, profile.height_cm));

    let sex_term = if male { 1.0 } else { 0.0 };
    let body_fat = clamp(
        1.2 * bmi + 0.23 * age - 10.8 * sex_term - 5.4 + 0.01 * z,
        FAT_PCT_BOUNDS,
    );

    let water = if male {
        2.447 - 0.09156 * age + 0.1074 * height + 0.3362 * w - 0.09477 * z / 100.0
    } else {
        0.296 + 0.192 * height + 0.274 * w - 0.131 * z / 100.0
    };
    let water = clamp(water, WATER_PCT_BOUNDS);

    // Floor applied last: below 12.5 kg the ceiling sits under the floor.
    let muscle = (w * (1.0 - body_fat / 100.0) * 0.85)
        .min(w * MUSCLE_CEILING_RATIO)
        .max(MUSCLE_FLOOR_KG);

    let bone = if male {
        0.180_168_94 * height - 0.052_62 * w + 0.2796 * z / 100.0 - 6.503_61
    } else {
        0.245_691_014 * height - 0.052_62 * w + 0.1645 * z / 100.0 - 5.1456
    };
    let bone = clamp(bone, BONE_KG_BOUNDS);

    let visceral = clamp(((body_fat - 10.0) / 2.5).round(), VISCERAL_BOUNDS);

    let bmr = 10.0 * w + 6.25 * height - 5.0 * age + if male { 5.0 } else { -161.0 };

    let avg_bmr = if male { 1680.0 } else { 1200.0 };
    let metabolic_age = if bmr > 0.0 {
        clamp((age * (avg_bmr / bmr)).round(), METABOLIC_AGE_BOUNDS)
    } else {
        METABOLIC_AGE_BOUNDS.1
    };

    CompositionProfile {
        body_fat_pct: round_to(body_fat as f32, 1),
        water_pct: round_to(water as f32, 1),
        muscle_kg: round_to(muscle as f32, 1),
        bone_kg: round_to(bone as f32, 2),
        visceral_fat: visceral as u8,
        bmr_kcal: bmr.round() as i32,
        metabolic_age: metabolic_age as u8,
        body_type: BodyType::from_body_fat(body_fat),
    }
}

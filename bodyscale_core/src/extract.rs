//! Weight and impedance extraction over an ordered rule list.
//!
//! First plausible candidate wins; later rules are not consulted.

use crate::rules::{ImpedanceRule, WeightRule};
use crate::util::{in_open_window, le_u16_at, round_to};

/// A weight picked by a rule, plus the index of the rule that matched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightHit {
    pub weight_kg: f32,
    pub rule: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpedanceHit {
    pub impedance_ohm: u16,
    pub rule: usize,
}

/// Evaluate `rules` in order; return the first weight inside its window.
///
/// The window applies to the value rounded to one decimal, so a hit never
/// lands on a window bound.
pub fn extract_weight(frame: &[u8], rules: &[WeightRule]) -> Option<WeightHit> {
    rules.iter().enumerate().find_map(|(idx, r)| {
        let raw = le_u16_at(frame, r.offset)?;
        let kg = round_to(f32::from(raw) / r.divisor, 1);
        if in_open_window(kg, r.min_kg, r.max_kg) {
            tracing::trace!(rule = idx, offset = r.offset, raw, weight_kg = kg, "weight candidate accepted");
            Some(WeightHit {
                weight_kg: kg,
                rule: idx,
            })
        } else {
            None
        }
    })
}

/// Evaluate `rules` in order; return the first impedance inside its window.
pub fn extract_impedance(frame: &[u8], rules: &[ImpedanceRule]) -> Option<ImpedanceHit> {
    rules.iter().enumerate().find_map(|(idx, r)| {
        let raw = le_u16_at(frame, r.offset)?;
        in_open_window(raw, r.min_ohm, r.max_ohm).then_some(ImpedanceHit {
            impedance_ohm: raw,
            rule: idx,
        })
    })
}

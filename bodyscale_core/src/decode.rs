//! The decode pipeline: validate, extract weight, extract impedance.

use crate::extract::{extract_impedance, extract_weight};
use crate::frame::{DecodeMiss, FrameValidator};
use crate::rules::RuleTable;
use serde::Serialize;

/// A plausible weight, optionally paired with the impedance from the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSample {
    pub weight_kg: f32,
    pub impedance_ohm: Option<u16>,
    /// The device reported its own reading as settled.
    pub stabilized: bool,
}

#[derive(Debug, Clone)]
pub struct Decoder {
    table: RuleTable,
    validator: FrameValidator,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(RuleTable::default(), true)
    }
}

impl Decoder {
    pub fn new(table: RuleTable, require_weight_flag: bool) -> Self {
        let validator = FrameValidator::for_table(&table, require_weight_flag);
        Self { table, validator }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    pub fn decode(&self, frame: &[u8]) -> Result<WeightSample, DecodeMiss> {
        let flags = self.validator.validate(frame)?;
        let weight = extract_weight(frame, self.table.weight_rules())
            .ok_or(DecodeMiss::NoWeightCandidate)?;
        let impedance = if flags.has_impedance {
            extract_impedance(frame, self.table.impedance_rules()).map(|h| h.impedance_ohm)
        } else {
            None
        };
        tracing::trace!(
            table = self.table.name,
            rule = weight.rule,
            weight_kg = weight.weight_kg,
            impedance_ohm = ?impedance,
            stabilized = flags.stabilized,
            "frame decoded"
        );
        Ok(WeightSample {
            weight_kg: weight.weight_kg,
            impedance_ohm: impedance,
            stabilized: flags.stabilized,
        })
    }
}

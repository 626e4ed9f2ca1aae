//! `From` implementations bridging `bodyscale_config` types to `bodyscale_core` types.

use std::time::Duration;

use bodyscale_config::{DecoderProfile, RuleTableCfg};
use bodyscale_traits::ConnectRequest;

use crate::composition::{BiometricProfile, Sex};
use crate::config::{AcceptancePolicy, SessionTiming, Stability, UserProfile};
use crate::decode::Decoder;
use crate::rules::{ImpedanceRule, RuleTable, WeightRule};

// ── Profile ──────────────────────────────────────────────────────────────────

impl From<bodyscale_config::SexCfg> for Sex {
    fn from(c: bodyscale_config::SexCfg) -> Self {
        match c {
            bodyscale_config::SexCfg::Male => Sex::Male,
            bodyscale_config::SexCfg::Female => Sex::Female,
        }
    }
}

impl From<&bodyscale_config::ProfileCfg> for UserProfile {
    fn from(c: &bodyscale_config::ProfileCfg) -> Self {
        Self {
            id: c.id.clone(),
            biometrics: BiometricProfile {
                age_years: c.age_years,
                height_cm: c.height_cm,
                sex: c.sex.into(),
            },
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

impl From<&bodyscale_config::SessionCfg> for SessionTiming {
    fn from(c: &bodyscale_config::SessionCfg) -> Self {
        Self {
            step_countdown: c.step_countdown_s,
            calibration_countdown: c.calibration_countdown_s,
            tick: Duration::from_millis(c.tick_ms),
            disconnect_delay: Duration::from_millis(c.disconnect_delay_ms),
        }
    }
}

impl From<bodyscale_config::StabilityCfg> for Stability {
    fn from(c: bodyscale_config::StabilityCfg) -> Self {
        match c {
            bodyscale_config::StabilityCfg::DeviceFlag => Stability::DeviceFlag,
            bodyscale_config::StabilityCfg::Window => Stability::Window,
        }
    }
}

impl From<&bodyscale_config::SessionCfg> for AcceptancePolicy {
    fn from(c: &bodyscale_config::SessionCfg) -> Self {
        Self {
            min_kg: c.accept_min_kg,
            max_kg: c.accept_max_kg,
            stability: c.stability.into(),
        }
    }
}

// ── Decoder ──────────────────────────────────────────────────────────────────

impl From<&bodyscale_config::WeightRuleCfg> for WeightRule {
    fn from(c: &bodyscale_config::WeightRuleCfg) -> Self {
        Self {
            priority: c.priority,
            offset: c.offset,
            divisor: c.divisor,
            min_kg: c.min_kg,
            max_kg: c.max_kg,
        }
    }
}

impl From<&bodyscale_config::ImpedanceRuleCfg> for ImpedanceRule {
    fn from(c: &bodyscale_config::ImpedanceRuleCfg) -> Self {
        Self {
            priority: c.priority,
            offset: c.offset,
            min_ohm: c.min_ohm,
            max_ohm: c.max_ohm,
        }
    }
}

impl From<DecoderProfile> for RuleTable {
    fn from(p: DecoderProfile) -> Self {
        match p {
            DecoderProfile::AdvertisementV1 => RuleTable::advertisement_v1(),
            DecoderProfile::NotificationV2 => RuleTable::notification_v2(),
            DecoderProfile::WeightOnly => RuleTable::weight_only(),
        }
    }
}

/// Build the decoder: built-in table for the profile, then inline overrides,
/// then rules from the CSV table (which win when present).
pub fn decoder_from_config(c: &bodyscale_config::DecoderCfg, csv: Option<&RuleTableCfg>) -> Decoder {
    let mut table = RuleTable::from(c.profile);
    if !c.weight_rules.is_empty() {
        table = table.with_weight_rules(c.weight_rules.iter().map(WeightRule::from).collect());
    }
    if !c.impedance_rules.is_empty() {
        table = table.with_impedance_rules(c.impedance_rules.iter().map(ImpedanceRule::from).collect());
    }
    if let Some(csv) = csv {
        if !csv.weight.is_empty() {
            table = table.with_weight_rules(csv.weight.iter().map(WeightRule::from).collect());
        }
        if !csv.impedance.is_empty() {
            table = table.with_impedance_rules(csv.impedance.iter().map(ImpedanceRule::from).collect());
        }
    }
    Decoder::new(table, c.require_weight_flag)
}

// ── Link ─────────────────────────────────────────────────────────────────────

pub fn connect_request(c: &bodyscale_config::LinkCfg) -> ConnectRequest {
    crate::discovery::connect_request(c.name_prefixes.iter().cloned(), c.names.iter().cloned())
}

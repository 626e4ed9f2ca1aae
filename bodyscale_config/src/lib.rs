#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and rule-table parsing for the body-composition scale.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The rule-table CSV loader enforces headers and rejects rows that could
//!   never produce a plausible value.
use serde::Deserialize;
use serde::de::Deserializer;

/// Biometric inputs for the composition estimator.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProfileCfg {
    /// Identifier of the person the readings belong to; scopes the history.
    pub id: String,
    pub age_years: u32,
    pub height_cm: f32,
    pub sex: SexCfg,
}

impl Default for ProfileCfg {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            age_years: 30,
            height_cm: 170.0,
            sex: SexCfg::Male,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SexCfg {
    #[default]
    Male,
    Female,
}

/// Which built-in rule table to start from.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DecoderProfile {
    AdvertisementV1,
    #[default]
    NotificationV2,
    WeightOnly,
}

/// One weight interpretation: little-endian u16 at `offset`, divided by `divisor`,
/// accepted inside the open window `(min_kg, max_kg)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRuleCfg {
    pub priority: u8,
    pub offset: usize,
    pub divisor: f32,
    pub min_kg: f32,
    pub max_kg: f32,
}

/// One impedance interpretation: little-endian u16 at `offset`, accepted inside
/// the open window `(min_ohm, max_ohm)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpedanceRuleCfg {
    pub priority: u8,
    pub offset: usize,
    pub min_ohm: u16,
    pub max_ohm: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DecoderCfg {
    pub profile: DecoderProfile,
    /// Reject frames whose control byte lacks the has-weight bit.
    pub require_weight_flag: bool,
    /// Optional weight rules replacing the profile's. Accepts either:
    /// - array of tables: [{ offset = 11, divisor = 200.0, min_kg = 5.0, max_kg = 300.0 }, ...]
    /// - array of tuples: [[11, 200.0], [1, 200.0], ...] (profile window applies)
    #[serde(deserialize_with = "de_weight_rules")]
    pub weight_rules: Vec<WeightRuleCfg>,
    /// Optional impedance rules replacing the profile's. Tables or bare offsets.
    #[serde(deserialize_with = "de_impedance_rules")]
    pub impedance_rules: Vec<ImpedanceRuleCfg>,
    /// Optional CSV rule table (headers `kind,priority,offset,divisor,min,max`).
    pub rules_csv: Option<String>,
}

impl Default for DecoderCfg {
    fn default() -> Self {
        Self {
            profile: DecoderProfile::NotificationV2,
            require_weight_flag: true,
            weight_rules: Vec::new(),
            impedance_rules: Vec::new(),
            rules_csv: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StabilityCfg {
    /// Require the device's own stabilized bit on the captured frame.
    DeviceFlag,
    /// Accept the first frame inside the acceptance window.
    #[default]
    Window,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionCfg {
    pub step_countdown_s: u8,
    pub calibration_countdown_s: u8,
    pub tick_ms: u64,
    /// Delay between a successful save and the automatic disconnect.
    pub disconnect_delay_ms: u64,
    pub accept_min_kg: f32,
    pub accept_max_kg: f32,
    pub stability: StabilityCfg,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            step_countdown_s: 5,
            calibration_countdown_s: 10,
            tick_ms: 1000,
            disconnect_delay_ms: 2000,
            accept_min_kg: 10.0,
            accept_max_kg: 300.0,
            stability: StabilityCfg::Window,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkBackend {
    #[default]
    Sim,
    Ble,
}

/// Parameters of the built-in simulated scale.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    pub weight_kg: f32,
    /// Impedance reported once the reading settles; 0 means "no impedance".
    pub impedance_ohm: u16,
    pub frame_interval_ms: u64,
    /// Frames of ramp-up before the simulated reading is stable.
    pub settle_frames: u32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            weight_kg: 72.4,
            impedance_ohm: 480,
            frame_interval_ms: 250,
            settle_frames: 6,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkCfg {
    pub backend: LinkBackend,
    pub name_prefixes: Vec<String>,
    pub names: Vec<String>,
    /// How long the frame pump waits on the link before re-checking for shutdown.
    pub poll_ms: u64,
    pub sim: SimCfg,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            backend: LinkBackend::Sim,
            name_prefixes: ["MIBFS", "MIBCS", "MI_SCALE", "MiScale", "Xiaomi"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            names: ["Mi Smart Scale2", "Mi Body Composition Scale 2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            poll_ms: 200,
            sim: SimCfg::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreCfg {
    /// CSV history file.
    pub path: String,
    pub history_limit: usize,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "readings.csv".to_string(),
            history_limit: 5,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub profile: ProfileCfg,
    pub decoder: DecoderCfg,
    pub session: SessionCfg,
    pub link: LinkCfg,
    pub store: StoreCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WeightRuleToml {
    Tuple((usize, f32)),
    Table {
        #[serde(default)]
        priority: Option<u8>,
        offset: usize,
        divisor: f32,
        #[serde(default)]
        min_kg: Option<f32>,
        #[serde(default)]
        max_kg: Option<f32>,
    },
}

/// Window used for tuple-form weight rules that do not state one.
pub const DEFAULT_WEIGHT_WINDOW_KG: (f32, f32) = (5.0, 300.0);
/// Window used for bare-offset impedance rules.
pub const DEFAULT_IMPEDANCE_WINDOW_OHM: (u16, u16) = (0, 3000);

fn de_weight_rules<'de, D>(deserializer: D) -> Result<Vec<WeightRuleCfg>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<WeightRuleToml>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for (idx, r) in items.into_iter().enumerate() {
            let position = u8::try_from(idx).unwrap_or(u8::MAX);
            let (lo, hi) = DEFAULT_WEIGHT_WINDOW_KG;
            match r {
                WeightRuleToml::Tuple((offset, divisor)) => out.push(WeightRuleCfg {
                    priority: position,
                    offset,
                    divisor,
                    min_kg: lo,
                    max_kg: hi,
                }),
                WeightRuleToml::Table {
                    priority,
                    offset,
                    divisor,
                    min_kg,
                    max_kg,
                } => out.push(WeightRuleCfg {
                    priority: priority.unwrap_or(position),
                    offset,
                    divisor,
                    min_kg: min_kg.unwrap_or(lo),
                    max_kg: max_kg.unwrap_or(hi),
                }),
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImpedanceRuleToml {
    Offset(usize),
    Table {
        #[serde(default)]
        priority: Option<u8>,
        offset: usize,
        #[serde(default)]
        min_ohm: Option<u16>,
        #[serde(default)]
        max_ohm: Option<u16>,
    },
}

fn de_impedance_rules<'de, D>(deserializer: D) -> Result<Vec<ImpedanceRuleCfg>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<ImpedanceRuleToml>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for (idx, r) in items.into_iter().enumerate() {
            let position = u8::try_from(idx).unwrap_or(u8::MAX);
            let (lo, hi) = DEFAULT_IMPEDANCE_WINDOW_OHM;
            match r {
                ImpedanceRuleToml::Offset(offset) => out.push(ImpedanceRuleCfg {
                    priority: position,
                    offset,
                    min_ohm: lo,
                    max_ohm: hi,
                }),
                ImpedanceRuleToml::Table {
                    priority,
                    offset,
                    min_ohm,
                    max_ohm,
                } => out.push(ImpedanceRuleCfg {
                    priority: priority.unwrap_or(position),
                    offset,
                    min_ohm: min_ohm.unwrap_or(lo),
                    max_ohm: max_ohm.unwrap_or(hi),
                }),
            }
        }
    }
    Ok(out)
}

/// Rule-table CSV schema.
///
/// Expected headers:
/// kind,priority,offset,divisor,min,max
///
/// Example:
/// kind,priority,offset,divisor,min,max
/// weight,0,11,200,10,300
/// weight,1,1,200,10,300
/// impedance,0,9,,0,3000
#[derive(Debug, Deserialize, Clone)]
pub struct RuleRow {
    pub kind: String,
    pub priority: u8,
    pub offset: usize,
    pub divisor: Option<f32>,
    pub min: f32,
    pub max: f32,
}

/// Weight and impedance rules parsed from a CSV table.
#[derive(Debug, Default, Clone)]
pub struct RuleTableCfg {
    pub weight: Vec<WeightRuleCfg>,
    pub impedance: Vec<ImpedanceRuleCfg>,
}

impl RuleTableCfg {
    pub fn from_rows(rows: Vec<RuleRow>) -> eyre::Result<Self> {
        if rows.is_empty() {
            eyre::bail!("rule table requires at least one row");
        }
        let mut out = RuleTableCfg::default();
        for (i, row) in rows.into_iter().enumerate() {
            // Data rows start on line 2 after the header
            let line = i + 2;
            if !(row.min < row.max) {
                eyre::bail!("rule on line {line}: min must be < max");
            }
            match row.kind.trim().to_ascii_lowercase().as_str() {
                "weight" => {
                    let divisor = row
                        .divisor
                        .ok_or_else(|| eyre::eyre!("weight rule on line {line} needs a divisor"))?;
                    out.weight.push(WeightRuleCfg {
                        priority: row.priority,
                        offset: row.offset,
                        divisor,
                        min_kg: row.min,
                        max_kg: row.max,
                    });
                }
                "impedance" => {
                    if row.min < 0.0 || row.max > f32::from(u16::MAX) {
                        eyre::bail!("impedance rule on line {line}: window must fit 0..=65535");
                    }
                    out.impedance.push(ImpedanceRuleCfg {
                        priority: row.priority,
                        offset: row.offset,
                        min_ohm: row.min as u16,
                        max_ohm: row.max as u16,
                    });
                }
                other => eyre::bail!("rule on line {line}: unknown kind '{other}'"),
            }
        }
        Ok(out)
    }
}

impl TryFrom<Vec<RuleRow>> for RuleTableCfg {
    type Error = eyre::Report;
    fn try_from(rows: Vec<RuleRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_rules_csv(path: &std::path::Path) -> eyre::Result<RuleTableCfg> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open rule table CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["kind", "priority", "offset", "divisor", "min", "max"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "rule table CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<RuleRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    RuleTableCfg::try_from(rows)
}

/// Highest byte offset a rule may name; frames top out around 20 bytes.
pub const MAX_RULE_OFFSET: usize = 31;

fn validate_weight_rule(r: &WeightRuleCfg, what: &str) -> eyre::Result<()> {
    if r.offset >= MAX_RULE_OFFSET {
        eyre::bail!("{what}: offset {} is beyond the frame (max {})", r.offset, MAX_RULE_OFFSET - 1);
    }
    if !(r.divisor.is_finite() && r.divisor > 0.0) {
        eyre::bail!("{what}: divisor must be > 0");
    }
    if !(r.min_kg >= 0.0 && r.min_kg < r.max_kg) {
        eyre::bail!("{what}: window must satisfy 0 <= min_kg < max_kg");
    }
    Ok(())
}

fn validate_impedance_rule(r: &ImpedanceRuleCfg, what: &str) -> eyre::Result<()> {
    if r.offset >= MAX_RULE_OFFSET {
        eyre::bail!("{what}: offset {} is beyond the frame (max {})", r.offset, MAX_RULE_OFFSET - 1);
    }
    if r.min_ohm >= r.max_ohm {
        eyre::bail!("{what}: window must satisfy min_ohm < max_ohm");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Profile
        if self.profile.id.trim().is_empty() {
            eyre::bail!("profile.id must not be empty");
        }
        if !(1..=120).contains(&self.profile.age_years) {
            eyre::bail!("profile.age_years must be in [1, 120]");
        }
        if !(self.profile.height_cm >= 50.0 && self.profile.height_cm <= 250.0) {
            eyre::bail!("profile.height_cm must be in [50, 250]");
        }

        // Decoder
        for (i, r) in self.decoder.weight_rules.iter().enumerate() {
            validate_weight_rule(r, &format!("decoder.weight_rules[{i}]"))?;
        }
        for (i, r) in self.decoder.impedance_rules.iter().enumerate() {
            validate_impedance_rule(r, &format!("decoder.impedance_rules[{i}]"))?;
        }
        if let Some(p) = &self.decoder.rules_csv
            && p.trim().is_empty()
        {
            eyre::bail!("decoder.rules_csv must not be empty when set");
        }

        // Session
        if self.session.step_countdown_s == 0 {
            eyre::bail!("session.step_countdown_s must be >= 1");
        }
        if self.session.calibration_countdown_s == 0 {
            eyre::bail!("session.calibration_countdown_s must be >= 1");
        }
        if self.session.tick_ms == 0 {
            eyre::bail!("session.tick_ms must be >= 1");
        }
        if self.session.tick_ms > 60 * 1000 {
            eyre::bail!("session.tick_ms is unreasonably large (>1min)");
        }
        if self.session.disconnect_delay_ms > 5 * 60 * 1000 {
            eyre::bail!("session.disconnect_delay_ms is unreasonably large (>5min)");
        }
        if !(self.session.accept_min_kg > 2.0
            && self.session.accept_max_kg <= 300.0
            && self.session.accept_min_kg < self.session.accept_max_kg)
        {
            eyre::bail!("session acceptance window must satisfy 2 < accept_min_kg < accept_max_kg <= 300");
        }

        // Link
        if self.link.name_prefixes.is_empty() && self.link.names.is_empty() {
            eyre::bail!("link needs at least one of name_prefixes or names");
        }
        if self.link.poll_ms == 0 {
            eyre::bail!("link.poll_ms must be >= 1");
        }
        if self.link.sim.frame_interval_ms == 0 {
            eyre::bail!("link.sim.frame_interval_ms must be >= 1");
        }
        if !(self.link.sim.weight_kg > 2.0 && self.link.sim.weight_kg < 300.0) {
            eyre::bail!("link.sim.weight_kg must be in (2, 300)");
        }
        if self.link.sim.impedance_ohm >= 3000 {
            eyre::bail!("link.sim.impedance_ohm must be < 3000");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }
        if self.store.history_limit == 0 {
            eyre::bail!("store.history_limit must be >= 1");
        }

        // Logging
        if let Some(rot) = &self.logging.rotation
            && !matches!(rot.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

//! The one-shot subcommands: decode, estimate, history, self-check.

use bodyscale_config::{Config, RuleTableCfg};
use bodyscale_core::composition::bmi;
use bodyscale_core::conversions::decoder_from_config;
use bodyscale_core::store::history;
use bodyscale_core::util::round_to;
use bodyscale_core::{BiometricProfile, CompositionProfile, Sex, UserProfile, estimate};
use serde_json::json;

use crate::cli::SexArg;
use crate::link::backend_label;
use crate::store::CsvReadingStore;

/// Parse hex like `a2 00 6c`, `a2:00:6c` or `0xa2006c`.
pub fn parse_hex(input: &str) -> eyre::Result<Vec<u8>> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !matches!(b, b' ' | b':' | b'-' | b'\t'))
        .collect();
    if digits.len() % 2 != 0 {
        eyre::bail!("hex frame has an odd number of digits");
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).map_err(|_| eyre::eyre!("invalid hex frame"))?;
            u8::from_str_radix(s, 16).map_err(|_| eyre::eyre!("invalid hex byte '{s}'"))
        })
        .collect()
}

fn composition_json(c: &CompositionProfile) -> serde_json::Value {
    json!(c)
}

pub fn run_decode(
    cfg: &Config,
    rules: Option<&RuleTableCfg>,
    hex: &str,
    as_json: bool,
) -> eyre::Result<()> {
    let bytes = parse_hex(hex)?;
    let decoder = decoder_from_config(&cfg.decoder, rules);
    let profile = UserProfile::from(&cfg.profile);
    match decoder.decode(&bytes) {
        Ok(sample) => {
            let composition = sample
                .impedance_ohm
                .filter(|z| *z > 0)
                .map(|z| estimate(sample.weight_kg, z, &profile.biometrics));
            if as_json {
                println!(
                    "{}",
                    json!({
                        "table": decoder.table().name,
                        "sample": sample,
                        "composition": composition.as_ref().map(composition_json),
                    })
                );
            } else {
                let impedance = sample
                    .impedance_ohm
                    .map_or_else(|| "none".to_string(), |z| format!("{z} ohm"));
                println!(
                    "weight {:.1} kg, impedance {impedance}, stabilized {}",
                    sample.weight_kg, sample.stabilized
                );
                if let Some(c) = composition {
                    print_composition(&c);
                }
            }
        }
        Err(miss) => {
            if as_json {
                println!(
                    "{}",
                    json!({ "table": decoder.table().name, "miss": miss.to_string() })
                );
            } else {
                println!("no reading: {miss}");
            }
        }
    }
    Ok(())
}

fn print_composition(c: &CompositionProfile) {
    println!(
        "body fat {:.1}%, water {:.1}%, muscle {:.1} kg, bone {:.2} kg",
        c.body_fat_pct, c.water_pct, c.muscle_kg, c.bone_kg
    );
    println!(
        "visceral fat {}, BMR {} kcal, metabolic age {}, body type {}",
        c.visceral_fat, c.bmr_kcal, c.metabolic_age, c.body_type
    );
}

pub struct EstimateArgs {
    pub weight: f32,
    pub impedance: u16,
    pub age: Option<u32>,
    pub height: Option<f32>,
    pub sex: Option<SexArg>,
}

pub fn run_estimate(cfg: &Config, args: &EstimateArgs, as_json: bool) -> eyre::Result<()> {
    if !(args.weight.is_finite() && args.weight > 2.0 && args.weight < 300.0) {
        eyre::bail!("weight must be in (2, 300) kg");
    }
    if args.impedance == 0 || args.impedance >= 3000 {
        eyre::bail!("impedance must be in (0, 3000) ohm");
    }
    let base = UserProfile::from(&cfg.profile).biometrics;
    let profile = BiometricProfile {
        age_years: args.age.unwrap_or(base.age_years),
        height_cm: args.height.unwrap_or(base.height_cm),
        sex: match args.sex {
            Some(SexArg::Male) => Sex::Male,
            Some(SexArg::Female) => Sex::Female,
            None => base.sex,
        },
    };
    if !(1..=120).contains(&profile.age_years) {
        eyre::bail!("age must be in [1, 120]");
    }
    if !(50.0..=250.0).contains(&profile.height_cm) {
        eyre::bail!("height must be in [50, 250] cm");
    }
    let c = estimate(args.weight, args.impedance, &profile);
    let bmi = round_to(bmi(args.weight, profile.height_cm), 2);
    if as_json {
        println!(
            "{}",
            json!({ "weight_kg": args.weight, "bmi": bmi, "composition": composition_json(&c) })
        );
    } else {
        println!("weight {:.1} kg, BMI {bmi:.2}", args.weight);
        print_composition(&c);
    }
    Ok(())
}

pub fn run_history(cfg: &Config, limit: Option<usize>, as_json: bool) -> eyre::Result<()> {
    let store = CsvReadingStore::new(&cfg.store.path);
    let limit = limit.unwrap_or(cfg.store.history_limit);
    let rows = history(&store, &cfg.profile.id, limit)?;
    if as_json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("no readings for profile '{}'", cfg.profile.id);
        return Ok(());
    }
    for r in &rows {
        let fat = r
            .body_fat_pct
            .map_or_else(|| "-".to_string(), |f| format!("{f:.1}%"));
        let body_type = r.body_type.map_or("-", |t| t.as_str());
        println!(
            "{}  {:>6.1} kg  BMI {:>5.2}  fat {:>6}  {}",
            r.measured_at.format("%Y-%m-%d %H:%M"),
            r.weight_kg,
            r.bmi,
            fat,
            body_type
        );
    }
    Ok(())
}

pub fn run_self_check(
    cfg: &Config,
    rules: Option<&RuleTableCfg>,
    as_json: bool,
) -> eyre::Result<()> {
    let decoder = decoder_from_config(&cfg.decoder, rules);
    let store = CsvReadingStore::new(&cfg.store.path);
    let stored = history(&store, &cfg.profile.id, usize::MAX)?.len();
    let backend = backend_label(&cfg.link);
    tracing::info!(backend, table = decoder.table().name, stored, "self-check");
    if as_json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "backend": backend,
                "decoder": decoder.table().name,
                "weight_rules": decoder.table().weight_rules().len(),
                "impedance_rules": decoder.table().impedance_rules().len(),
                "store": cfg.store.path,
                "stored_readings": stored,
            })
        );
    } else {
        println!("config ok");
        println!(
            "decoder {} ({} weight rules, {} impedance rules)",
            decoder.table().name,
            decoder.table().weight_rules().len(),
            decoder.table().impedance_rules().len()
        );
        println!("link backend {backend}");
        println!("store {} ({stored} readings)", cfg.store.path);
        println!("self-check ok");
    }
    Ok(())
}

//! `measure`: connect, capture, confirm, save.
//!
//! The driver runs on the main thread. A second thread watches published
//! updates, prints them and answers with commands (capture once connected,
//! confirm or reject once a sample is held).

use std::io::BufRead;
use std::time::Duration;

use bodyscale_config::{Config, RuleTableCfg};
use bodyscale_core::conversions::{connect_request, decoder_from_config};
use bodyscale_core::{Reading, SessionDriver, SessionHandle, SessionUpdate};
use crossbeam_channel as xch;
use serde_json::json;

use crate::link::make_link;
use crate::store::CsvReadingStore;

/// How the capture ended, as seen by the update watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Saved(Box<Reading>),
    Rejected,
    TimedOut,
    Cancelled,
}

pub fn run_measure(
    cfg: &Config,
    rules: Option<&RuleTableCfg>,
    yes: bool,
    json: bool,
) -> eyre::Result<Outcome> {
    let link = make_link(&cfg.link)?;
    let mut driver = SessionDriver::builder()
        .with_link(link)
        .with_store(CsvReadingStore::new(&cfg.store.path))
        .with_decoder(decoder_from_config(&cfg.decoder, rules))
        .with_profile((&cfg.profile).into())
        .with_timing((&cfg.session).into())
        .with_acceptance((&cfg.session).into())
        .with_poll_interval(Duration::from_millis(cfg.link.poll_ms))
        .build()?;

    let handle = driver.handle();
    {
        let h = handle.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            h.shutdown();
        }) {
            tracing::warn!(error = %e, "ctrl-c handler not installed");
        }
    }

    let updates = driver.updates();
    let watcher = std::thread::spawn(move || watch(&updates, &handle, yes, json));
    let result = driver.run(&connect_request(&cfg.link));
    // Dropping the driver closes the update channel and ends the watcher.
    drop(driver);
    let outcome = watcher.join().unwrap_or(Outcome::Cancelled);
    result?;
    Ok(outcome)
}

fn ask(question: &str) -> bool {
    eprint!("{question} [y/N] ");
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => matches!(line.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

fn watch(
    updates: &xch::Receiver<SessionUpdate>,
    handle: &SessionHandle,
    yes: bool,
    json: bool,
) -> Outcome {
    let mut outcome = Outcome::Cancelled;
    for update in updates {
        if json {
            if let Some(line) = update_json(&update) {
                println!("{line}");
            }
        } else {
            print_update(&update);
        }
        match update {
            SessionUpdate::Connected { .. } => {
                handle.capture();
            }
            SessionUpdate::SampleCaptured(captured) => {
                let keep = yes
                    || ask(&format!(
                        "Keep {:.1} kg?",
                        captured.sample.weight_kg
                    ));
                if keep {
                    handle.confirm();
                } else {
                    handle.reject();
                }
            }
            SessionUpdate::PersistFailed { .. } => {
                if !yes && ask("Saving failed. Retry?") {
                    handle.confirm();
                } else {
                    handle.shutdown();
                }
            }
            SessionUpdate::Committed(reading) => outcome = Outcome::Saved(Box::new(reading)),
            SessionUpdate::Rejected => {
                outcome = Outcome::Rejected;
                handle.shutdown();
            }
            SessionUpdate::TimedOut => {
                outcome = Outcome::TimedOut;
                handle.shutdown();
            }
            _ => {}
        }
    }
    outcome
}

fn print_update(update: &SessionUpdate) {
    match update {
        SessionUpdate::Connected { device } => eprintln!("Connected to {device}."),
        SessionUpdate::Countdown { phase, remaining } => match phase {
            bodyscale_core::Phase::AwaitingStep => eprintln!("Step on the scale in {remaining}..."),
            _ => eprintln!("Hold still... {remaining}"),
        },
        SessionUpdate::SampleCaptured(c) => match (c.sample.impedance_ohm, &c.composition) {
            (Some(z), Some(comp)) => eprintln!(
                "Captured {:.1} kg, {z} ohm: fat {:.1}%, water {:.1}%, muscle {:.1} kg, bone {:.2} kg, BMR {} kcal, body type {}",
                c.sample.weight_kg,
                comp.body_fat_pct,
                comp.water_pct,
                comp.muscle_kg,
                comp.bone_kg,
                comp.bmr_kcal,
                comp.body_type
            ),
            _ => eprintln!("Captured {:.1} kg (no impedance).", c.sample.weight_kg),
        },
        SessionUpdate::Committed(r) => println!(
            "Saved {:.1} kg (BMI {:.2}) at {}",
            r.weight_kg,
            r.bmi,
            r.measured_at.to_rfc3339()
        ),
        SessionUpdate::Rejected => eprintln!("Discarded."),
        SessionUpdate::TimedOut => eprintln!("No stable reading in time."),
        SessionUpdate::Cancelled => eprintln!("Capture cancelled."),
        SessionUpdate::PersistFailed { message } => eprintln!("Saving failed: {message}"),
        SessionUpdate::CommandRejected(e) => tracing::debug!(error = %e, "command refused"),
        SessionUpdate::LiveWeight { weight_kg } => tracing::debug!(weight_kg, "live weight"),
        SessionUpdate::Disconnected => tracing::info!("disconnected"),
    }
}

/// One JSON line per update; live weight is left to the logs.
pub fn update_json(update: &SessionUpdate) -> Option<serde_json::Value> {
    let v = match update {
        SessionUpdate::Connected { device } => json!({ "event": "connected", "device": device }),
        SessionUpdate::Disconnected => json!({ "event": "disconnected" }),
        SessionUpdate::LiveWeight { .. } => return None,
        SessionUpdate::Countdown { phase, remaining } => {
            json!({ "event": "countdown", "phase": phase.as_str(), "remaining": remaining })
        }
        SessionUpdate::SampleCaptured(c) => json!({
            "event": "sample_captured",
            "sample": c.sample,
            "composition": c.composition,
        }),
        SessionUpdate::Committed(r) => json!({ "event": "committed", "reading": r }),
        SessionUpdate::Rejected => json!({ "event": "rejected" }),
        SessionUpdate::TimedOut => json!({ "event": "timed_out" }),
        SessionUpdate::Cancelled => json!({ "event": "cancelled" }),
        SessionUpdate::PersistFailed { message } => {
            json!({ "event": "persist_failed", "message": message })
        }
        SessionUpdate::CommandRejected(e) => {
            json!({ "event": "command_rejected", "reason": e.to_string() })
        }
    };
    Some(v)
}

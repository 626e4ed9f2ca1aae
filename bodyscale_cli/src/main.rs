mod cli;
mod commands;
mod error_fmt;
mod link;
mod logging;
mod measure;
mod store;

use std::path::Path;

use bodyscale_config::{Config, RuleTableCfg, load_rules_csv};
use bodyscale_core::ScaleError;
use clap::Parser;
use eyre::{Result, WrapErr};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::commands::EstimateArgs;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::measure::Outcome;

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn config_error(e: &eyre::Report) -> eyre::Report {
    eyre::Report::new(ScaleError::Config(format!("{e:#}")))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .wrap_err_with(|| format!("failed to read config {}", p.display()))?;
            bodyscale_config::load_toml(&text)
                .map_err(|e| eyre::Report::new(ScaleError::Config(e.to_string())))?
        }
        None => Config::default(),
    };
    cfg.validate().map_err(|e| config_error(&e))?;
    Ok(cfg)
}

fn load_rules(cfg: &Config) -> Result<Option<RuleTableCfg>> {
    cfg.decoder
        .rules_csv
        .as_deref()
        .map(|p| load_rules_csv(Path::new(p)).map_err(|e| config_error(&e)))
        .transpose()
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    logging::init_tracing(cli.json, &cli.log_level, &cfg.logging);
    let rules = load_rules(&cfg)?;
    tracing::debug!(config = ?cli.config, decoder = ?cfg.decoder.profile, "config loaded");

    match cli.cmd {
        Commands::Measure { yes } => {
            let outcome = measure::run_measure(&cfg, rules.as_ref(), yes, cli.json)?;
            tracing::info!(?outcome, "measure finished");
            if !cli.json && matches!(outcome, Outcome::Cancelled) {
                eprintln!("Session ended without a reading.");
            }
            Ok(())
        }
        Commands::Decode { hex } => commands::run_decode(&cfg, rules.as_ref(), &hex, cli.json),
        Commands::Estimate {
            weight,
            impedance,
            age,
            height,
            sex,
        } => commands::run_estimate(
            &cfg,
            &EstimateArgs {
                weight,
                impedance,
                age,
                height,
                sex,
            },
            cli.json,
        ),
        Commands::History { limit } => commands::run_history(&cfg, limit, cli.json),
        Commands::SelfCheck => commands::run_self_check(&cfg, rules.as_ref(), cli.json),
    }
}

//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "bodyscale", version, about = "Body composition scale CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit JSON lines (logs, results and errors) instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SexArg {
    Male,
    Female,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the scale, capture one reading and save it
    Measure {
        /// Keep the captured sample without asking
        #[arg(long, action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Decode one raw frame given as hex (spaces and colons allowed)
    Decode {
        #[arg(value_name = "HEX")]
        hex: String,
    },
    /// Estimate body composition from a weight and an impedance
    Estimate {
        #[arg(long, value_name = "KG")]
        weight: f32,
        #[arg(long, value_name = "OHM")]
        impedance: u16,
        /// Override the configured profile age
        #[arg(long, value_name = "YEARS")]
        age: Option<u32>,
        /// Override the configured profile height
        #[arg(long, value_name = "CM")]
        height: Option<f32>,
        /// Override the configured profile sex
        #[arg(long, value_enum)]
        sex: Option<SexArg>,
    },
    /// Show the most recent readings for the configured profile
    History {
        /// Number of readings; defaults to store.history_limit
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Validate the config and check that the configured link backend is usable
    SelfCheck,
}

//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// spikewatch -- scan a log export for error-rate spikes.
///
/// Use `spikewatch <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "spikewatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the spikewatch.toml configuration file.
    ///
    /// When omitted, `spikewatch.toml` in the working directory is used if it
    /// exists; otherwise built-in defaults apply.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format for the command result.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan one log export file and report alert groups.
    Scan(ScanArgs),

    /// Inspect the configured alert rules.
    Rules(RulesArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan ----

/// Scan a delimited log export chunk by chunk.
#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// File to scan (overrides `monitor.data_path`).
    pub path: Option<PathBuf>,

    /// Maximum rows per chunk (overrides `monitor.chunk_size`).
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Window aggregation mode (overrides `monitor.window_mode`).
    #[arg(long)]
    pub window_mode: Option<WindowModeArg>,

    /// Per-chunk diagnostics verbosity (overrides `monitor.verbosity`).
    #[arg(long)]
    pub verbosity: Option<VerbosityArg>,

    /// Where alert groups go while scanning.
    #[arg(long, default_value = "log")]
    pub alerts: AlertOutput,

    /// Exit with a non-zero code when any alert group was reported.
    #[arg(long)]
    pub fail_on_alert: bool,
}

/// Window aggregation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WindowModeArg {
    /// Windows never span chunk boundaries.
    ChunkLocal,
    /// Open windows carry into the next chunk.
    CarryOver,
}

impl WindowModeArg {
    /// Config file spelling of this mode.
    pub fn as_config_str(self) -> &'static str {
        match self {
            Self::ChunkLocal => "chunk_local",
            Self::CarryOver => "carry_over",
        }
    }
}

/// Diagnostics verbosity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerbosityArg {
    Quiet,
    Normal,
    Verbose,
}

impl VerbosityArg {
    /// Config file spelling of this level.
    pub fn as_config_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Normal => "normal",
            Self::Verbose => "verbose",
        }
    }
}

/// Alert delivery targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AlertOutput {
    /// Log alerts at warn level through tracing.
    #[default]
    Log,
    /// Write one JSON object per alert group to stdout.
    JsonLines,
}

// ---- rules ----

/// Inspect alert rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List the rules the monitor would evaluate, in evaluation order.
    List,
}

// ---- config ----

/// Manage spikewatch configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, monitor).
        #[arg(long)]
        section: Option<String>,
    },
}

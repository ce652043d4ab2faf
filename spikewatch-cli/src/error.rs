//! CLI-specific error types and exit code mapping

use spikewatch_core::error::{SourceError, SpikewatchError};
use spikewatch_monitor::MonitorError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The source file was missing or had no data rows.
    #[error("source rejected: {path}")]
    Rejected { path: String },

    /// `--fail-on-alert` was set and the scan reported alert groups.
    #[error("scan reported {groups} alert group(s)")]
    AlertsRaised { groups: u64 },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from spikewatch-core.
    #[error("{0}")]
    Core(#[from] SpikewatchError),

    /// Monitor pipeline error.
    #[error("{0}")]
    Monitor(#[from] MonitorError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success                                   |
    /// | 1    | General / command error                   |
    /// | 2    | Configuration or rule error               |
    /// | 3    | Source missing or empty                   |
    /// | 4    | Alerts raised (with `--fail-on-alert`)    |
    /// | 10   | IO error (including mid-scan read failure) |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Rejected { .. } => 3,
            Self::AlertsRaised { .. } => 4,
            Self::Io(_) => 10,
            Self::Core(err) => match err {
                SpikewatchError::Config(_) | SpikewatchError::Rule(_) => 2,
                SpikewatchError::Source(SourceError::EmptyOrMissing { .. }) => 3,
                SpikewatchError::Source(SourceError::Unreadable { .. }) | SpikewatchError::Io(_) => {
                    10
                }
                SpikewatchError::Source(SourceError::Layout(_)) => 1,
            },
            Self::Monitor(err) => match err {
                MonitorError::Config { .. }
                | MonitorError::RuleValidation { .. }
                | MonitorError::Schema(_) => 2,
                MonitorError::EmptyOrMissingSource { .. } => 3,
                MonitorError::SourceIo { .. } => 10,
                _ => 1,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

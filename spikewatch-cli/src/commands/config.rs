//! `spikewatch config` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use spikewatch_core::config::SpikewatchConfig;
use spikewatch_monitor::MonitorConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::settings::ConfigSource;

/// Result of loading the effective configuration.
pub type Loaded = Result<(SpikewatchConfig, ConfigSource), CliError>;

/// Execute the `config` command.
///
/// Takes the load result as-is so that `validate` can report load failures
/// instead of aborting on them.
pub fn execute(args: ConfigArgs, loaded: Loaded, writer: &OutputWriter) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(loaded, writer),
        ConfigAction::Show { section } => {
            let (config, source) = loaded?;
            execute_show(&config, &source, section.as_deref(), writer)
        }
    }
}

/// Validate the configuration end to end.
///
/// Runs the core value checks and then the monitor conversion, which checks
/// the schema and every rule.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails.
fn execute_validate(loaded: Loaded, writer: &OutputWriter) -> Result<(), CliError> {
    let report = validation_report(loaded);
    info!(source = %report.source, valid = report.valid, "validated configuration");

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

fn validation_report(loaded: Loaded) -> ConfigValidationReport {
    let (config, source) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            return ConfigValidationReport {
                source: "(unreadable)".to_owned(),
                valid: false,
                errors: vec![e.to_string()],
            };
        }
    };

    let mut errors = Vec::new();
    if let Err(e) = config.validate() {
        errors.push(e.to_string());
    } else if let Err(e) = MonitorConfig::from_core(&config.monitor) {
        errors.push(e.to_string());
    }

    ConfigValidationReport {
        source: source.describe(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Show the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Command` if the section name is unknown.
fn execute_show(
    config: &SpikewatchConfig,
    source: &ConfigSource,
    section: Option<&str>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = config_report(config, source, section)?;
    writer.render(&report)
}

fn config_report(
    config: &SpikewatchConfig,
    source: &ConfigSource,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section {
        None => to_toml(config),
        Some("general") => to_toml(&config.general),
        Some("monitor") => to_toml(&config.monitor),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: general, monitor)",
                other
            )));
        }
    };

    Ok(ConfigReport {
        source: source.describe(),
        section: section.map(str::to_owned),
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {})", e))
}

/// Configuration display report.
///
/// The `config_toml` field is skipped during JSON serialization (only used for text rendering).
#[derive(Serialize)]
pub struct ConfigReport {
    /// Where the configuration came from
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        match &self.section {
            Some(section) => writeln!(w, "Configuration [{}] (source: {})", section, self.source)?,
            None => writeln!(w, "Configuration (source: {})", self.source)?,
        }
        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Where the configuration came from
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.valid {
            writeln!(w, "Configuration is valid (source: {})", self.source)?;
        } else {
            writeln!(w, "Configuration is INVALID (source: {})", self.source)?;
            for error in &self.errors {
                writeln!(w, "  - {}", error)?;
            }
        }
        Ok(())
    }
}

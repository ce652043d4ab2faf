//! Effective configuration resolution
//!
//! Precedence, lowest first:
//! 1. built-in defaults
//! 2. the config file (explicit `--config`, or `spikewatch.toml` when present)
//! 3. legacy `DATA_PATH` / `CHUNK_SIZE` environment variables
//! 4. `SPIKEWATCH_{SECTION}_{FIELD}` environment variables
//! 5. command-line flags (applied by the caller)

use std::path::{Path, PathBuf};

use tracing::warn;

use spikewatch_core::config::SpikewatchConfig;
use spikewatch_core::error::{ConfigError, SpikewatchError};

use crate::error::CliError;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "spikewatch.toml";

/// Legacy data path variable.
pub const LEGACY_DATA_PATH_ENV: &str = "DATA_PATH";

/// Legacy chunk size variable.
pub const LEGACY_CHUNK_SIZE_ENV: &str = "CHUNK_SIZE";

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Human-readable description for reports.
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Defaults => "(built-in defaults)".to_owned(),
        }
    }
}

/// Load the configuration with environment overrides, without validating.
///
/// An explicit path must exist. The implicit `spikewatch.toml` falls back to
/// defaults when missing.
pub async fn load(explicit: Option<&Path>) -> Result<(SpikewatchConfig, ConfigSource), CliError> {
    let (mut config, source) = match explicit {
        Some(path) => (
            SpikewatchConfig::from_file(path).await?,
            ConfigSource::File(path.to_path_buf()),
        ),
        None => match SpikewatchConfig::from_file(DEFAULT_CONFIG_FILE).await {
            Ok(config) => (config, ConfigSource::File(PathBuf::from(DEFAULT_CONFIG_FILE))),
            Err(SpikewatchError::Config(ConfigError::FileNotFound { .. })) => {
                (SpikewatchConfig::default(), ConfigSource::Defaults)
            }
            Err(e) => return Err(e.into()),
        },
    };

    apply_legacy_env(&mut config);
    config.apply_env_overrides();
    Ok((config, source))
}

/// Apply `DATA_PATH` and `CHUNK_SIZE`.
///
/// These sit below the `SPIKEWATCH_*` variables, which are applied afterwards.
pub fn apply_legacy_env(config: &mut SpikewatchConfig) {
    if let Ok(path) = std::env::var(LEGACY_DATA_PATH_ENV) {
        config.monitor.data_path = path;
    }
    if let Ok(raw) = std::env::var(LEGACY_CHUNK_SIZE_ENV) {
        match raw.parse::<usize>() {
            Ok(size) => config.monitor.chunk_size = size,
            Err(_) => warn!(
                env_key = LEGACY_CHUNK_SIZE_ENV,
                value = raw.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

/// Validate the merged configuration, mapping failures to `CliError::Config`.
pub fn validate(config: &SpikewatchConfig) -> Result<(), CliError> {
    config
        .validate()
        .map_err(|e| CliError::Config(e.to_string()))
}

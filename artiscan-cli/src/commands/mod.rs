//! Command handlers -- one module per subcommand

pub mod config;
pub mod resolve;
pub mod run;

use std::path::Path;

use artiscan_core::config::{ArtiscanConfig, GeneralConfig};

use crate::cli::DEFAULT_CONFIG_PATH;
use crate::error::CliError;

/// Loads the effective configuration.
///
/// A missing file at the default location falls back to defaults plus
/// environment overrides; an explicitly named file must exist.
pub async fn load_config(config_path: &Path) -> Result<ArtiscanConfig, CliError> {
    if config_path == Path::new(DEFAULT_CONFIG_PATH) && !config_path.exists() {
        let mut config = ArtiscanConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        return Ok(config);
    }
    Ok(ArtiscanConfig::load(config_path).await?)
}

/// Best-effort `[general]` section for logging setup, before any command runs.
///
/// Never fails: an unreadable file yields the defaults, and the command itself
/// reports the configuration problem afterwards.
pub async fn logging_config(config_path: &Path) -> GeneralConfig {
    match ArtiscanConfig::from_file(config_path).await {
        Ok(mut config) => {
            config.apply_env_overrides();
            config.general
        }
        Err(_) => {
            let mut config = ArtiscanConfig::default();
            config.apply_env_overrides();
            config.general
        }
    }
}

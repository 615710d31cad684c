//! `artiscan config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use artiscan_core::config::ArtiscanConfig;

use super::load_config;
use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const REDACTED: &str = "***REDACTED***";

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Loads and validates the configuration, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails (parse errors, missing file,
/// out-of-range values).
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match load_config(config_path).await {
        Ok(_) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Displays the effective configuration (file + env overrides + defaults)
/// with API tokens redacted.
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if the
/// section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let mut config = load_config(config_path).await?;
    redact_credentials(&mut config);

    let report = ConfigReport {
        source: config_path.display().to_string(),
        config_toml: section_toml(&config, section.as_deref())?,
        section,
    };

    writer.render(&report)?;

    Ok(())
}

fn section_toml(config: &ArtiscanConfig, section: Option<&str>) -> Result<String, CliError> {
    let rendered = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("store") => toml::to_string_pretty(&config.store),
        Some("lineage") => toml::to_string_pretty(&config.lineage),
        Some("crawler") => toml::to_string_pretty(&config.crawler),
        Some("report") => toml::to_string_pretty(&config.report),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: general, store, lineage, crawler, report)",
                other
            )));
        }
    };
    Ok(rendered.unwrap_or_else(|e| format!("(serialization error: {})", e)))
}

/// Replaces non-empty API tokens with a fixed marker.
fn redact_credentials(config: &mut ArtiscanConfig) {
    for token in [&mut config.store.token, &mut config.lineage.token] {
        if !token.is_empty() {
            *token = REDACTED.to_owned();
        }
    }
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

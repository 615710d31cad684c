//! `artiscan resolve` command handler
//!
//! Runs the path resolver offline so operators can check how paths will be
//! reported, or why they will be skipped.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use artiscan_core::types::Ecosystem;
use artiscan_crawler::{CrawlerConfig, PathResolver, Resolution};

use super::load_config;
use crate::cli::ResolveArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `resolve` command.
pub async fn execute(
    args: ResolveArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let ecosystem = Ecosystem::from_str_loose(&args.ecosystem).ok_or_else(|| {
        CliError::Command(format!(
            "unknown ecosystem: {} (expected: container, npm, generic)",
            args.ecosystem
        ))
    })?;

    let resolver = CrawlerConfig::from_core(&config).resolver()?;
    let report = ResolveReport::build(&resolver, ecosystem, &args.paths);
    writer.render(&report)
}

/// Resolution of a batch of paths.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub ecosystem: Ecosystem,
    pub entries: Vec<ResolveEntry>,
}

#[derive(Debug, Serialize)]
pub struct ResolveEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_or_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl ResolveReport {
    pub fn build(resolver: &PathResolver, ecosystem: Ecosystem, paths: &[String]) -> Self {
        let entries = paths
            .iter()
            .map(|path| match resolver.resolve(ecosystem, path) {
                Resolution::Identity(identity) => ResolveEntry {
                    path: path.clone(),
                    name: Some(identity.name),
                    version_or_tag: Some(identity.version_or_tag),
                    skip_reason: None,
                },
                Resolution::Skip(reason) => ResolveEntry {
                    path: path.clone(),
                    name: None,
                    version_or_tag: None,
                    skip_reason: Some(reason.as_str().to_owned()),
                },
            })
            .collect();
        Self { ecosystem, entries }
    }
}

impl Render for ResolveReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Ecosystem: {}", self.ecosystem.to_string().bold())?;
        for entry in &self.entries {
            match (&entry.name, &entry.version_or_tag, &entry.skip_reason) {
                (Some(name), Some(tag), _) => {
                    writeln!(w, "  {} -> {}:{}", entry.path, name.green(), tag.green())?
                }
                (_, _, Some(reason)) => {
                    writeln!(w, "  {} -> skip ({})", entry.path, reason.yellow())?
                }
                _ => writeln!(w, "  {} -> ?", entry.path)?,
            }
        }
        Ok(())
    }
}

//! CLI argument parsing using clap derive API
//!
//! Purely declarative; no side effects or I/O.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Default configuration file, optional when absent.
pub const DEFAULT_CONFIG_PATH: &str = "artiscan.toml";

/// artiscan -- artifact store inventory crawler.
///
/// Use `artiscan <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "artiscan", version, about, long_about = None)]
pub struct Cli {
    /// Path to the artiscan.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
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
    /// Crawl the store and write the CSV inventory report.
    Run(RunArgs),

    /// Show how artifact paths resolve, without contacting the store.
    Resolve(ResolveArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Crawl every repository and write the report.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Override the report directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Crawl only these repositories (repeatable).
    #[arg(long = "repo")]
    pub repos: Vec<String>,

    /// Crawl only these ecosystems (repeatable: container, npm, generic).
    #[arg(long = "ecosystem")]
    pub ecosystems: Vec<String>,

    /// Skip lineage lookups; every row gets N/A.
    #[arg(long)]
    pub no_lineage: bool,

    /// Date stamp of the report file (YYYY-MM-DD, default: today).
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

// ---- resolve ----

/// Resolve artifact paths to canonical identities.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Ecosystem whose rules apply (container, npm, generic).
    pub ecosystem: String,

    /// Store-relative artifact paths.
    #[arg(required = true)]
    pub paths: Vec<String>,
}

// ---- config ----

/// Manage artiscan configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, store, lineage, crawler, report).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::try_parse_from(["artiscan", "run"]).expect("parse succeeded");
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(cli.output, OutputFormat::Text);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.output_dir.is_none());
                assert!(args.repos.is_empty());
                assert!(!args.no_lineage);
                assert!(args.date.is_none());
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "artiscan",
            "run",
            "--output-dir",
            "/tmp/out",
            "--repo",
            "docker-prod",
            "--repo",
            "npm-local",
            "--ecosystem",
            "npm",
            "--no-lineage",
            "--date",
            "2025-01-31",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/out")));
                assert_eq!(args.repos, vec!["docker-prod", "npm-local"]);
                assert_eq!(args.ecosystems, vec!["npm"]);
                assert!(args.no_lineage);
                assert_eq!(args.date, NaiveDate::from_ymd_opt(2025, 1, 31));
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn parse_run_rejects_bad_date() {
        assert!(Cli::try_parse_from(["artiscan", "run", "--date", "31/01/2025"]).is_err());
    }

    #[test]
    fn parse_resolve_requires_paths() {
        assert!(Cli::try_parse_from(["artiscan", "resolve", "container"]).is_err());

        let cli = Cli::try_parse_from([
            "artiscan",
            "resolve",
            "npm",
            "lodash/-/lodash-4.17.21.tgz",
            "x/y",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.ecosystem, "npm");
                assert_eq!(args.paths.len(), 2);
            }
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "artiscan",
            "config",
            "show",
            "--section",
            "store",
            "--output",
            "json",
            "--config",
            "/etc/artiscan.toml",
            "--log-level",
            "debug",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("/etc/artiscan.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("store")),
            _ => panic!("expected config show"),
        }
    }

    #[test]
    fn parse_rejects_unknown_output_format() {
        assert!(Cli::try_parse_from(["artiscan", "--output", "yaml", "run"]).is_err());
    }
}

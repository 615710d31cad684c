//! artiscan -- artifact store inventory crawler
//!
//! Exit codes: 0 success, 1 general error, 2 configuration error,
//! 3 repository enumeration failure, 4 report write failure.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut general = commands::logging_config(&cli.config).await;
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("warning: {e}");
    }

    if let Err(e) = dispatch(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.config, &writer).await,
        Commands::Resolve(args) => commands::resolve::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}

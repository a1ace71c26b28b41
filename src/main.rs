//! cdkfetch - daily reward code collector
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use cdkfetch::cli::args::AcquireArgs;
use cdkfetch::cli::{Cli, Commands};
use cdkfetch::core::logging::{self, LogSettings};
use cdkfetch::storage::{ENV_NO_COLOR, ENV_NO_COLOR_STD};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = LogSettings::resolve(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
        &|key| std::env::var(key).ok(),
    );
    logging::init(&settings);

    let format = cli.effective_format();
    let pretty = cli.pretty;
    let no_color = cli.no_color
        || [ENV_NO_COLOR, ENV_NO_COLOR_STD]
            .iter()
            .any(|key| std::env::var_os(key).is_some_and(|v| !v.is_empty()));

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            let error_output =
                cdkfetch::render::error::render_error_full(&e, format, no_color, pretty);
            eprintln!("{error_output}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: &Cli) -> cdkfetch::Result<()> {
    match &cli.command {
        // Default to the acquire command
        None => cdkfetch::cli::acquire::execute(cli, &AcquireArgs::default()).await,
        Some(Commands::Acquire(args)) => cdkfetch::cli::acquire::execute(cli, args).await,
        Some(Commands::Accounts(cmd)) => cdkfetch::cli::accounts::execute(cli, cmd),
        Some(Commands::Sessions(cmd)) => cdkfetch::cli::sessions::execute(cli, cmd),
        Some(Commands::Providers) => cdkfetch::cli::providers::execute(cli),
    }
}

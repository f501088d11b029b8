mod cli;
mod commands;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vouchly_core::SqliteStore;

use crate::cli::{Cli, Command, LogFormat};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Neither needs the database
        Command::Config(args) => commands::config_cmd::handle(&args, &cli.global),
        Command::Completions(args) => {
            commands::completions(&args);
            Ok(())
        }

        cmd => {
            let config = vouchly_config::load_config(cli.global.config.as_deref())?;
            let db_path = config.database_path();
            tracing::debug!(database = %db_path.display(), "opening store");
            let store = Arc::new(SqliteStore::open(&db_path).await?);

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &store, &config, &cli.global).await;
            store.close().await;
            result
        }
    }
}

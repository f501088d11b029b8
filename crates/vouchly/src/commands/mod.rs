//! Command dispatch: bridges CLI args -> store / sync service -> output.

pub mod config_cmd;
pub mod credentials;
pub mod sales;
pub mod sites;
pub mod sync;

use std::sync::Arc;

use clap::CommandFactory;
use vouchly_config::Config;
use vouchly_core::SqliteStore;

use crate::cli::{Cli, Command, CompletionsArgs, GlobalOpts};
use crate::error::CliError;

/// Dispatch a store-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    store: &Arc<SqliteStore>,
    config: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Run => sync::run(store, config, global).await,
        Command::Sync => sync::sync_all(store, config, global).await,
        Command::SyncSite { site_id } => sync::sync_site(store, config, &site_id, global).await,
        Command::Credentials(args) => credentials::handle(store.as_ref(), args, global).await,
        Command::Sites(args) => sites::handle(store.as_ref(), args, global).await,
        Command::Sales(args) => sales::handle(store.as_ref(), args, global).await,
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(args) => {
            completions(&args);
            Ok(())
        }
    }
}

/// Write a completion script for `args.shell` to stdout.
pub fn completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    clap_complete::generate(args.shell, &mut cmd, "vouchly", &mut std::io::stdout());
}

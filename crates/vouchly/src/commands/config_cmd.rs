//! Config subcommand handlers. These run without opening the store.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = vouchly_config::load_config(global.config.as_deref())?;
            output::print_output(cfg.to_toml()?.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            let config_file = global
                .config
                .clone()
                .unwrap_or_else(vouchly_config::config_path);
            // An unreadable config still has a well-defined default database.
            let database = vouchly_config::load_config(global.config.as_deref()).map_or_else(
                |_| vouchly_config::default_database_path(),
                |cfg| cfg.database_path(),
            );

            let out = output::render_fields(&[
                ("config", config_file.display().to_string()),
                ("database", database.display().to_string()),
            ]);
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

//! Clap derive structures for the `vouchly` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use vouchly_core::SaleSource;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vouchly -- keep the sales ledger in step with Omada voucher usage
#[derive(Debug, Parser)]
#[command(
    name = "vouchly",
    version,
    about = "Reconcile Omada hotspot voucher status with the local sales ledger",
    long_about = "Polls an Omada controller for voucher usage and mirrors it locally.\n\n\
        A voucher seen in use or expired on the controller is marked consumed\n\
        and gets exactly one sale recorded. Local status never moves backwards.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output, Color & Log Enums ────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the periodic sync loop until Ctrl-C
    Run,

    /// Sync every active site once and print the report
    Sync,

    /// Force a sync of a single site
    SyncSite {
        /// Local site ID
        site_id: String,
    },

    /// Manage Omada controller credentials
    #[command(alias = "creds")]
    Credentials(CredentialsArgs),

    /// Manage locally known sites
    Sites(SitesArgs),

    /// Inspect recorded sales
    Sales(SalesArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Credentials ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CredentialsArgs {
    #[command(subcommand)]
    pub command: CredentialsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CredentialsCommand {
    /// Store controller credentials, replacing any existing ones
    Set {
        /// Controller base URL (e.g. https://omada.local:8043)
        #[arg(long)]
        url: Url,

        /// Omada controller ID (omadacId)
        #[arg(long)]
        omadac_id: String,

        /// OpenAPI client ID
        #[arg(long)]
        client_id: String,

        /// OpenAPI client secret
        #[arg(long, env = "VOUCHLY_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
    },

    /// Show stored credentials (secret masked)
    Show,
}

// ── Sites ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SitesArgs {
    #[command(subcommand)]
    pub command: SitesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SitesCommand {
    /// List sites
    #[command(alias = "ls")]
    List,

    /// Add a site or update an existing one
    Add {
        /// Local site ID
        id: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Omada site ID this site maps onto
        #[arg(long)]
        omada_site_id: Option<String>,

        /// Store the site as inactive (excluded from sync)
        #[arg(long)]
        inactive: bool,
    },
}

// ── Sales ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SalesArgs {
    #[command(subcommand)]
    pub command: SalesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SalesCommand {
    /// List sales in the order they were made
    #[command(alias = "ls")]
    List {
        /// Only sales from this source
        #[arg(long)]
        source: Option<SourceArg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// Recorded at the counter
    Manual,
    /// Recorded by voucher sync
    #[value(name = "omada_sync", alias = "omada-sync")]
    OmadaSync,
}

impl From<SourceArg> for SaleSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Manual => Self::Manual,
            SourceArg::OmadaSync => Self::OmadaSync,
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file and database locations
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

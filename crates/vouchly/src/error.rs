//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vouchly_config::ConfigError;
use vouchly_core::{CoreError, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    /// The sweep ran but some site did not finish cleanly.
    pub const PARTIAL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Controller ───────────────────────────────────────────────────

    #[error("No Omada controller credentials stored")]
    #[diagnostic(
        code(vouchly::no_credentials),
        help(
            "Store them with: vouchly credentials set --url <URL> --omadac-id <ID> \
             --client-id <ID>\n\
             The client secret can come from VOUCHLY_CLIENT_SECRET."
        )
    )]
    NoCredentials,

    #[error("Authentication with the Omada controller failed: {message}")]
    #[diagnostic(
        code(vouchly::auth_failed),
        help(
            "Verify the client ID and secret under Settings > Platform Integration\n\
             on the controller, then run: vouchly credentials set ..."
        )
    )]
    AuthFailed { message: String },

    #[error("Could not reach the Omada controller: {message}")]
    #[diagnostic(
        code(vouchly::connection_failed),
        help(
            "Check the controller URL and that it is reachable.\n\
             For a self-signed certificate set http.insecure = true or http.ca_cert."
        )
    )]
    ConnectionFailed { message: String },

    #[error("Omada API error: {message}")]
    #[diagnostic(code(vouchly::api_error))]
    ApiError { message: String },

    #[error("Sync finished with {failed} of {total} site(s) incomplete")]
    #[diagnostic(
        code(vouchly::sync_incomplete),
        help("Run again with -v for per-site details.")
    )]
    SyncIncomplete { failed: usize, total: usize },

    // ── Sites ────────────────────────────────────────────────────────

    #[error("Site '{site_id}' not found")]
    #[diagnostic(code(vouchly::not_found), help("Run: vouchly sites list"))]
    SiteNotFound { site_id: String },

    #[error("Site '{site_id}' cannot be synced: {reason}")]
    #[diagnostic(
        code(vouchly::site_not_syncable),
        help("Activate it with: vouchly sites add {site_id} --name <NAME> --omada-site-id <ID>")
    )]
    SiteNotSyncable { site_id: String, reason: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vouchly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(vouchly::config),
        help("Run: vouchly config path  to see which file is read")
    )]
    Config(#[from] ConfigError),

    // ── Storage / IO ─────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(code(vouchly::store))]
    Store(#[from] StoreError),

    #[error("Sync cancelled")]
    #[diagnostic(code(vouchly::cancelled))]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON output: {0}")]
    #[diagnostic(code(vouchly::json))]
    Json(#[from] serde_json::Error),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoCredentials => Self::NoCredentials,
            CoreError::Auth { message } | CoreError::TokenRejected { message } => {
                Self::AuthFailed { message }
            }
            // No status: the transport failed or the body was unreadable.
            CoreError::RemoteApi {
                message,
                status: None,
                code: None,
            } => Self::ConnectionFailed { message },
            CoreError::RemoteApi { message, .. } => Self::ApiError { message },
            CoreError::Cancelled => Self::Cancelled,
            CoreError::SiteNotFound { site_id } => Self::SiteNotFound { site_id },
            CoreError::SiteNotSyncable { site_id, reason } => {
                Self::SiteNotSyncable { site_id, reason }
            }
            CoreError::Store(e) => Self::Store(e),
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCredentials | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::SiteNotFound { .. } => exit_code::NOT_FOUND,
            Self::SiteNotSyncable { .. } | Self::Validation { .. } | Self::Config(_) => {
                exit_code::USAGE
            }
            Self::SyncIncomplete { .. } => exit_code::PARTIAL,
            Self::ApiError { .. }
            | Self::Store(_)
            | Self::Cancelled
            | Self::Io(_)
            | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

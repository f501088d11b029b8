// ── Core error types ──
//
// Sync-level errors from vouchly-core. Callers never see raw reqwest or
// sqlx errors: `From<vouchly_api::Error>` and `From<sqlx::Error>` fold
// them into the variants below.

use thiserror::Error;

/// Persistence failures surfaced by a [`VoucherStore`](crate::store::VoucherStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A sale already exists for this voucher. Raised by the store's
    /// uniqueness guarantee, so concurrent writers cannot double-count.
    #[error("Sale already recorded for voucher {voucher_id}")]
    DuplicateSale { voucher_id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "Record",
                id: "unknown".into(),
            },
            sqlx::Error::Database(db_err) => Self::Database(db_err.message().to_owned()),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(err.to_string())
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Remote controller ────────────────────────────────────────────
    /// Could not obtain an access token. Fatal for the current site.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The controller rejected an access token that looked valid locally.
    #[error("Access token rejected by controller: {message}")]
    TokenRejected { message: String },

    #[error("Omada API error: {message}")]
    RemoteApi {
        message: String,
        status: Option<u16>,
        code: Option<i64>,
    },

    #[error("Sync cancelled")]
    Cancelled,

    // ── Local data ───────────────────────────────────────────────────
    #[error("No Omada controller credentials configured")]
    NoCredentials,

    #[error("Site not found: {site_id}")]
    SiteNotFound { site_id: String },

    #[error("Site {site_id} cannot be synced: {reason}")]
    SiteNotSyncable { site_id: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether invalidating the cached token and retrying could help.
    pub fn is_token_rejected(&self) -> bool {
        matches!(self, Self::TokenRejected { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vouchly_api::Error> for CoreError {
    fn from(err: vouchly_api::Error) -> Self {
        if err.is_auth_expired() {
            return Self::TokenRejected {
                message: err.to_string(),
            };
        }

        match err {
            vouchly_api::Error::Authentication { message } => Self::Auth { message },
            vouchly_api::Error::Api {
                status,
                code,
                message,
            } => Self::RemoteApi {
                message,
                status: Some(status),
                code,
            },
            vouchly_api::Error::Cancelled => Self::Cancelled,
            vouchly_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("invalid controller URL: {e}"),
            },
            vouchly_api::Error::Tls(message) => Self::Config {
                message: format!("TLS: {message}"),
            },
            other @ (vouchly_api::Error::Transport(_)
            | vouchly_api::Error::Deserialization { .. }) => Self::RemoteApi {
                message: other.to_string(),
                status: None,
                code: None,
            },
        }
    }
}

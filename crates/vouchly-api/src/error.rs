use thiserror::Error;

/// Omada error codes signalling an expired or invalid access token.
const TOKEN_EXPIRED_CODES: &[i64] = &[-44112, -44113];

/// Top-level error type for the `vouchly-api` crate.
///
/// Covers every failure mode of the Omada OpenAPI surface: token
/// acquisition, transport, envelope-level errors, and payload parsing.
/// `vouchly-core` maps these into sync-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token acquisition or renewal failed (bad client credentials,
    /// non-zero `errorCode` from the authorize endpoint, HTTP failure).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate configuration error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Omada OpenAPI ───────────────────────────────────────────────
    /// Non-2xx HTTP status or a non-zero `errorCode` in the
    /// `{errorCode, msg, result}` envelope. `code` is `None` when the
    /// failure happened at the HTTP level before the envelope was read.
    #[error("Omada API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A paginated walk was stopped by its cancellation token.
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if this error indicates the access token has expired
    /// or was rejected, so invalidating the cached token might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Api { status: 401, .. } => true,
            Self::Api {
                code: Some(code), ..
            } => TOKEN_EXPIRED_CODES.contains(code),
            _ => false,
        }
    }

    /// Returns `true` for rate limiting, server errors, timeouts and refused
    /// connections. The page walker retries these once.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

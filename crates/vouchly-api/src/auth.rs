// Client-credentials authentication against the Omada OpenAPI.
//
// The controller hands out short-lived access tokens. `TokenManager`
// owns a single cached token and renews it shortly before expiry, so
// a sweep only pays for the authorize round-trip once per token lifetime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::types::{Envelope, TokenRequest, TokenResult};

/// A cached token is reused only while it is more than this far from expiry.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Lifetime assumed when the authorize response omits `expiresIn`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

// ── Credentials ──────────────────────────────────────────────────────

/// Client-credentials bundle for one Omada controller.
#[derive(Debug, Clone)]
pub struct OmadaCredentials {
    /// Controller base URL (e.g. `https://omada.example.com:8043`).
    pub base_url: Url,
    /// Controller (tenant) id, the `omadacId` path segment.
    pub omadac_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

impl OmadaCredentials {
    /// `{base}/openapi/authorize/token?grant_type=client_credentials`
    pub(crate) fn token_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["openapi", "authorize", "token"]);
        url.query_pairs_mut()
            .append_pair("grant_type", "client_credentials");
        Ok(url)
    }
}

/// Identifies which controller/client a cached token was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenScope {
    base_url: String,
    omadac_id: String,
    client_id: String,
}

impl From<&OmadaCredentials> for TokenScope {
    fn from(creds: &OmadaCredentials) -> Self {
        Self {
            base_url: creds.base_url.as_str().trim_end_matches('/').to_owned(),
            omadac_id: creds.omadac_id.clone(),
            client_id: creds.client_id.clone(),
        }
    }
}

// ── Cached token ─────────────────────────────────────────────────────

/// An access token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    access_token: SecretString,
    expires_at: Instant,
    scope: TokenScope,
}

impl CachedToken {
    /// Whether the token may still be handed out at `now`: strictly more
    /// than [`TOKEN_REFRESH_MARGIN`] before its recorded expiry.
    pub fn is_usable_at(&self, now: Instant) -> bool {
        now.checked_add(TOKEN_REFRESH_MARGIN)
            .is_some_and(|deadline| deadline < self.expires_at)
    }

    /// Seconds until hard expiry (0 once expired).
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.expires_at.saturating_duration_since(now).as_secs()
    }
}

// ── TokenManager ─────────────────────────────────────────────────────

/// Single-slot, process-owned token cache with proactive renewal.
///
/// Cheap to share behind an `Arc`. Readers never block: the slot is an
/// `ArcSwapOption`, and no lock is held across the authorize request.
/// Two callers racing to renew may both hit the controller; the last
/// successful response wins and the slot is never left half-written.
///
/// On a failed renewal the slot is cleared, so the next caller starts
/// from a clean authorize attempt instead of retrying a stale token.
pub struct TokenManager {
    http: reqwest::Client,
    cache: ArcSwapOption<CachedToken>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            cache: ArcSwapOption::empty(),
        }
    }

    /// Return a token valid for `creds`, reusing the cached one when it
    /// is outside the renewal margin and renewing it otherwise.
    pub async fn get_valid_token(&self, creds: &OmadaCredentials) -> Result<SecretString, Error> {
        let scope = TokenScope::from(creds);

        if let Some(cached) = self.cache.load_full() {
            let now = Instant::now();
            if cached.scope == scope && cached.is_usable_at(now) {
                debug!(
                    remaining_secs = cached.remaining_secs(now),
                    "using cached access token"
                );
                return Ok(cached.access_token.clone());
            }
        }

        match self.request_token(creds, scope).await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                self.cache.store(Some(Arc::new(fresh)));
                Ok(token)
            }
            Err(e) => {
                self.cache.store(None);
                warn!(error = %e, "token renewal failed, cache cleared");
                Err(e)
            }
        }
    }

    /// Drop the cached token unconditionally.
    ///
    /// Called when the controller rejects a token mid-sweep.
    pub fn invalidate(&self) {
        if self.cache.swap(None).is_some() {
            debug!("access token invalidated");
        }
    }

    /// Whether a token is currently cached (regardless of freshness).
    pub fn has_cached_token(&self) -> bool {
        self.cache.load().is_some()
    }

    async fn request_token(
        &self,
        creds: &OmadaCredentials,
        scope: TokenScope,
    ) -> Result<CachedToken, Error> {
        let url = creds.token_url()?;
        debug!("requesting access token at {}", url);

        let body = TokenRequest {
            omadac_id: &creds.omadac_id,
            client_id: &creds.client_id,
            client_secret: creds.client_secret.expose_secret(),
        };

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Authentication {
                message: format!("token request failed: {e}"),
            })?;

        let status = resp.status();
        let raw = resp.text().await.map_err(|e| Error::Authentication {
            message: format!("failed to read token response: {e}"),
        })?;

        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!(
                    "token request failed (HTTP {status}): {}",
                    preview(&raw)
                ),
            });
        }

        let envelope: Envelope<TokenResult> =
            serde_json::from_str(&raw).map_err(|e| Error::Authentication {
                message: format!("malformed token response: {e}"),
            })?;

        if envelope.error_code != 0 {
            return Err(Error::Authentication {
                message: envelope
                    .msg
                    .unwrap_or_else(|| format!("errorCode={}", envelope.error_code)),
            });
        }

        let result = envelope.result.ok_or_else(|| Error::Authentication {
            message: "token response carried no result".into(),
        })?;

        let lifetime = result
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);

        info!(expires_in_secs = lifetime.as_secs(), "obtained access token");

        Ok(CachedToken {
            access_token: SecretString::from(result.access_token),
            expires_at: Instant::now() + lifetime,
            scope,
        })
    }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}

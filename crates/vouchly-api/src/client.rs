// Hand-crafted async HTTP client for the Omada OpenAPI (hotspot vouchers).
//
// Base path: /openapi/v1/{omadacId}/
// Auth: `Authorization: AccessToken=<token>` (not `Bearer`)

use std::sync::OnceLock;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::auth::OmadaCredentials;
use crate::error::Error;
use crate::pagination::{GROUP_PAGE_SIZE, PageWalk, VOUCHER_PAGE_SIZE, collect_pages};
use crate::transport::TransportConfig;
use crate::types::{Envelope, Page, Voucher, VoucherGroup, VoucherGroupDetailPage};

// ── Group detail ─────────────────────────────────────────────────────

/// Every voucher of one group together with the group's pricing metadata
/// (taken from the first detail page).
#[derive(Debug)]
pub struct VoucherGroupDetail {
    pub group_id: String,
    pub name: Option<String>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
    pub vouchers: PageWalk<Voucher>,
}

#[derive(Debug, Clone)]
struct GroupMeta {
    name: Option<String>,
    unit_price: Option<Decimal>,
    currency: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for one Omada controller's OpenAPI.
///
/// Holds no token state: every call takes the access token explicitly,
/// so the caller decides when to renew through [`TokenManager`](crate::TokenManager).
#[derive(Debug, Clone)]
pub struct OmadaClient {
    http: reqwest::Client,
    base_url: Url,
    omadac_id: String,
    group_page_size: u32,
    voucher_page_size: u32,
}

impl OmadaClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client with its own `reqwest::Client` from a transport config.
    pub fn new(
        base_url: Url,
        omadac_id: String,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, omadac_id))
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, omadac_id: String) -> Self {
        Self {
            http,
            base_url,
            omadac_id,
            group_page_size: GROUP_PAGE_SIZE,
            voucher_page_size: VOUCHER_PAGE_SIZE,
        }
    }

    /// Override the page sizes used by the `list_all_*` walkers.
    /// Zero keeps the current value.
    pub fn with_page_sizes(mut self, group_page_size: u32, voucher_page_size: u32) -> Self {
        if group_page_size > 0 {
            self.group_page_size = group_page_size;
        }
        if voucher_page_size > 0 {
            self.voucher_page_size = voucher_page_size;
        }
        self
    }

    /// Build a client for the controller named in `creds`, sharing `http`.
    pub fn for_credentials(http: reqwest::Client, creds: &OmadaCredentials) -> Self {
        Self::with_client(http, creds.base_url.clone(), creds.omadac_id.clone())
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// `{base}/openapi/v1/{omadacId}/{segments...}`, with each segment escaped.
    fn openapi_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(["openapi", "v1", self.omadac_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Fetch one page of a paginated resource and unwrap the envelope.
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &SecretString,
        page: u32,
        page_size: u32,
    ) -> Result<T, Error> {
        debug!("GET {} page={} pageSize={}", url, page, page_size);

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, access_token_header(token)?)
            .query(&[("page", page), ("pageSize", page_size)])
            .send()
            .await?;

        parse_envelope(resp).await
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Voucher groups ───────────────────────────────────────────────

    pub async fn list_voucher_groups(
        &self,
        site_id: &str,
        token: &SecretString,
        page: u32,
        page_size: u32,
    ) -> Result<Page<VoucherGroup>, Error> {
        let url = self.openapi_url(&["sites", site_id, "hotspot", "voucher-groups"])?;
        self.fetch_page(url, token, page, page_size).await
    }

    pub async fn get_voucher_group_detail(
        &self,
        site_id: &str,
        group_id: &str,
        token: &SecretString,
        page: u32,
        page_size: u32,
    ) -> Result<VoucherGroupDetailPage, Error> {
        let url =
            self.openapi_url(&["sites", site_id, "hotspot", "voucher-groups", group_id])?;
        self.fetch_page(url, token, page, page_size).await
    }

    /// Walk every voucher group of a site.
    ///
    /// Holds no state between calls: each call is a fresh walk from page 1.
    pub async fn list_all_voucher_groups(
        &self,
        site_id: &str,
        token: &SecretString,
        cancel: &CancellationToken,
    ) -> PageWalk<VoucherGroup> {
        collect_pages("voucher-groups", self.group_page_size, cancel, |page, size| {
            self.list_voucher_groups(site_id, token, page, size)
        })
        .await
    }

    /// Walk every voucher of a group, capturing the group's pricing from
    /// the first page.
    pub async fn list_all_vouchers(
        &self,
        site_id: &str,
        group_id: &str,
        token: &SecretString,
        cancel: &CancellationToken,
    ) -> VoucherGroupDetail {
        let meta: OnceLock<GroupMeta> = OnceLock::new();
        let meta_ref = &meta;

        let fetch = |page: u32, size: u32| async move {
            let detail = self
                .get_voucher_group_detail(site_id, group_id, token, page, size)
                .await?;
            let _ = meta_ref.set(GroupMeta {
                name: detail.name,
                unit_price: detail.unit_price,
                currency: detail.currency,
            });
            Ok::<_, Error>(detail.page)
        };
        let vouchers = collect_pages("vouchers", self.voucher_page_size, cancel, fetch).await;

        let meta = meta.into_inner();
        VoucherGroupDetail {
            group_id: group_id.to_owned(),
            name: meta.as_ref().and_then(|m| m.name.clone()),
            unit_price: meta.as_ref().and_then(|m| m.unit_price),
            currency: meta.and_then(|m| m.currency),
            vouchers,
        }
    }
}

// ── Response handling ────────────────────────────────────────────────

/// `Authorization` header value in the scheme Omada requires.
fn access_token_header(token: &SecretString) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(&format!("AccessToken={}", token.expose_secret()))
        .map_err(|e| Error::Authentication {
            message: format!("invalid access token header value: {e}"),
        })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Unwrap `{errorCode, msg, result}`. Non-2xx statuses and non-zero
/// `errorCode` both become [`Error::Api`].
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        // Omada often still sends an envelope alongside an error status.
        let parsed = serde_json::from_str::<Envelope<serde_json::Value>>(&body).ok();
        return Err(Error::Api {
            status: status.as_u16(),
            code: parsed.as_ref().map(|e| e.error_code),
            message: parsed
                .and_then(|e| e.msg)
                .unwrap_or_else(|| format!("HTTP {status}: {}", preview(&body))),
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
        Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        }
    })?;

    if envelope.error_code != 0 {
        return Err(Error::Api {
            status: status.as_u16(),
            code: Some(envelope.error_code),
            message: envelope
                .msg
                .unwrap_or_else(|| format!("errorCode={}", envelope.error_code)),
        });
    }

    envelope.result.ok_or_else(|| Error::Deserialization {
        message: "envelope reported success but carried no result".into(),
        body,
    })
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}

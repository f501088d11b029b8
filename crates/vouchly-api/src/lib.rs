//! Async client for the Omada SDN controller OpenAPI.
//!
//! Covers the slice of the API the voucher reconciliation service needs:
//!
//! - **[`TokenManager`]** — client-credentials grant with a single cached
//!   token, renewed [`TOKEN_REFRESH_MARGIN`] before expiry.
//! - **[`OmadaClient`]** — paginated voucher-group and voucher-detail
//!   listings under `/openapi/v1/{omadacId}/sites/{siteId}/hotspot/`.
//! - **[`collect_pages`]** — the page walker both listings share; it keeps
//!   partial results when a page fails.
//! - **[`TransportConfig`]** — TLS and timeout settings shared by every
//!   request (strict by default, self-signed tolerated on request).

pub mod auth;
pub mod client;
pub mod error;
pub mod pagination;
pub mod transport;
pub mod types;

pub use auth::{
    CachedToken, DEFAULT_TOKEN_LIFETIME, OmadaCredentials, TOKEN_REFRESH_MARGIN, TokenManager,
};
pub use client::{OmadaClient, VoucherGroupDetail};
pub use error::Error;
pub use pagination::{GROUP_PAGE_SIZE, PageWalk, VOUCHER_PAGE_SIZE, collect_pages};
pub use transport::{TlsMode, TransportConfig};
pub use types::{Page, RemoteVoucherStatus, Voucher, VoucherGroup, VoucherGroupDetailPage};

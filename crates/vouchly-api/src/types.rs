// Wire types for the Omada OpenAPI.
//
// Every response is wrapped in `{errorCode, msg, result}`. Required
// fields are non-optional so a payload missing them fails to parse
// instead of surfacing as half-empty structs downstream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── Envelope ─────────────────────────────────────────────────────────

/// The `{errorCode, msg, result}` wrapper around every OpenAPI response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Envelope<T> {
    pub error_code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    pub result: Option<T>,
}

// ── Authorization ────────────────────────────────────────────────────

/// Body of `POST /openapi/authorize/token?grant_type=client_credentials`.
#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    #[serde(rename = "omadacId")]
    pub omadac_id: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

/// `result` payload of a successful token request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResult {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

// ── Pagination ───────────────────────────────────────────────────────

/// One page of a paginated listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_rows: u64,
    pub current_page: u32,
    pub current_size: u32,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Whether rows remain beyond this page: `currentPage * currentSize < totalRows`.
    /// A page reporting `currentSize = 0` never has more.
    pub fn has_more(&self) -> bool {
        self.current_size > 0
            && u64::from(self.current_page) * u64::from(self.current_size) < self.total_rows
    }
}

// ── Voucher groups ───────────────────────────────────────────────────

/// A batch of vouchers as listed by
/// `GET /openapi/v1/{omadacId}/sites/{siteId}/hotspot/voucher-groups`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub unused_count: u32,
    #[serde(default)]
    pub used_count: u32,
    #[serde(default)]
    pub in_use_count: u32,
    #[serde(default)]
    pub expired_count: u32,
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
}

/// One page of `GET .../hotspot/voucher-groups/{groupId}`: the group's own
/// pricing metadata plus a page of its vouchers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherGroupDetailPage {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(flatten)]
    pub page: Page<Voucher>,
}

// ── Vouchers ─────────────────────────────────────────────────────────

/// Voucher state as reported by the controller.
///
/// The controller encodes it as `0`/`1`/`2`; the raw integer never
/// travels past deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum RemoteVoucherStatus {
    Unused,
    InUse,
    Expired,
}

impl TryFrom<i64> for RemoteVoucherStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Unused),
            1 => Ok(Self::InUse),
            2 => Ok(Self::Expired),
            other => Err(format!("unknown voucher status code {other}")),
        }
    }
}

impl From<RemoteVoucherStatus> for i64 {
    fn from(status: RemoteVoucherStatus) -> Self {
        match status {
            RemoteVoucherStatus::Unused => 0,
            RemoteVoucherStatus::InUse => 1,
            RemoteVoucherStatus::Expired => 2,
        }
    }
}

/// A single voucher inside a group.
///
/// `id` is controller-internal; cross-referencing with local records
/// always goes through `code`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: String,
    pub code: String,
    pub status: RemoteVoucherStatus,
    /// Usage start, epoch milliseconds.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Elapsed usage in seconds.
    #[serde(default)]
    pub duration: Option<i64>,
    /// Remaining time in seconds.
    #[serde(default)]
    pub time_left: Option<i64>,
}

impl Voucher {
    /// Usage start as a UTC timestamp, if the controller reported one.
    pub fn started_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.start_time
            .and_then(chrono::DateTime::from_timestamp_millis)
    }
}

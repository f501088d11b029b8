// ── Local voucher domain type ──

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use vouchly_api::RemoteVoucherStatus;

/// Local voucher lifecycle.
///
/// Ordered `Available < InUse | Expired`. Once a voucher leaves
/// `Available` the sync engine never writes it back.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocalVoucherStatus {
    Available,
    InUse,
    Expired,
}

impl LocalVoucherStatus {
    /// `true` once the voucher has been consumed in any way.
    pub fn is_consumed(self) -> bool {
        !matches!(self, Self::Available)
    }
}

impl From<RemoteVoucherStatus> for LocalVoucherStatus {
    fn from(remote: RemoteVoucherStatus) -> Self {
        match remote {
            RemoteVoucherStatus::Unused => Self::Available,
            RemoteVoucherStatus::InUse => Self::InUse,
            RemoteVoucherStatus::Expired => Self::Expired,
        }
    }
}

/// A voucher as recorded locally.
///
/// Cross-referenced with the controller by `code` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: String,
    pub code: String,
    pub plan_id: Option<String>,
    pub site_id: String,
    pub seller_id: Option<String>,
    pub omada_group_id: Option<String>,
    pub omada_voucher_id: Option<String>,
    pub unit_price: Decimal,
    pub status: LocalVoucherStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a freshly generated voucher. Always starts `Available`.
#[derive(Debug, Clone)]
pub struct NewVoucher {
    pub code: String,
    pub site_id: String,
    pub plan_id: Option<String>,
    pub seller_id: Option<String>,
    pub omada_group_id: Option<String>,
    pub omada_voucher_id: Option<String>,
    pub unit_price: Decimal,
}

impl NewVoucher {
    pub fn new(code: impl Into<String>, site_id: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            code: code.into(),
            site_id: site_id.into(),
            plan_id: None,
            seller_id: None,
            omada_group_id: None,
            omada_voucher_id: None,
            unit_price,
        }
    }

    pub fn with_seller(mut self, seller_id: impl Into<String>) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    pub(crate) fn into_voucher(self) -> Voucher {
        Voucher {
            id: uuid::Uuid::new_v4().to_string(),
            code: self.code,
            plan_id: self.plan_id,
            site_id: self.site_id,
            seller_id: self.seller_id,
            omada_group_id: self.omada_group_id,
            omada_voucher_id: self.omada_voucher_id,
            unit_price: self.unit_price,
            status: LocalVoucherStatus::Available,
            used_at: None,
            created_at: Utc::now(),
        }
    }
}

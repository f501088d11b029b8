// ── Sale domain type ──

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Note attached to every sale recorded by the sync engine.
pub const AUTO_SYNC_NOTE: &str = "Auto-synced from Omada controller";

/// Where a sale came from. Persisted as the payment method.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SaleSource {
    /// Recorded by a seller at the counter.
    Manual,
    /// Derived from a voucher status change observed on the controller.
    OmadaSync,
}

/// A recorded sale. At most one exists per voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub voucher_id: String,
    pub seller_id: Option<String>,
    pub site_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub source: SaleSource,
    pub sold_at: DateTime<Utc>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`VoucherStore::create_sale`](crate::store::VoucherStore::create_sale).
#[derive(Debug, Clone)]
pub struct NewSale {
    pub voucher_id: String,
    pub seller_id: Option<String>,
    pub site_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub source: SaleSource,
    pub sold_at: DateTime<Utc>,
    pub note: Option<String>,
}

impl NewSale {
    pub(crate) fn into_sale(self) -> Sale {
        Sale {
            id: uuid::Uuid::new_v4().to_string(),
            voucher_id: self.voucher_id,
            seller_id: self.seller_id,
            site_id: self.site_id,
            amount: self.amount,
            currency: self.currency,
            source: self.source,
            sold_at: self.sold_at,
            note: self.note,
            created_at: Utc::now(),
        }
    }
}

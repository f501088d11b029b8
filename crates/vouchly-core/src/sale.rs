// ── Sale idempotency guard ──
//
// The only place sync creates sales. Checks for an existing sale first,
// and treats the store's duplicate rejection as the same outcome, so a
// voucher never ends up with two sales however often it is revisited.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use vouchly_api::{Voucher as RemoteVoucher, VoucherGroup, VoucherGroupDetail};

use crate::error::StoreError;
use crate::model::{AUTO_SYNC_NOTE, NewSale, SaleSource, Voucher};
use crate::store::VoucherStore;

/// Pricing a voucher group carries on the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPricing {
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
}

impl GroupPricing {
    /// Prefer the detail page's values, fall back to the group listing.
    pub fn resolve(group: &VoucherGroup, detail: &VoucherGroupDetail) -> Self {
        Self {
            unit_price: detail.unit_price.or(group.unit_price),
            currency: detail
                .currency
                .clone()
                .or_else(|| group.currency.clone())
                .filter(|c| !c.trim().is_empty()),
        }
    }
}

/// Record a sale for `voucher` unless one already exists.
///
/// Returns `true` if a sale was inserted. The amount is the group price
/// when known, else the voucher's own price. The sale time is the
/// controller's usage start when reported, else now.
pub async fn ensure_sale_recorded<S: VoucherStore>(
    store: &S,
    voucher: &Voucher,
    pricing: &GroupPricing,
    remote: &RemoteVoucher,
    default_currency: &str,
) -> Result<bool, StoreError> {
    if let Some(existing) = store.get_sale_by_voucher_id(&voucher.id).await? {
        info!(
            voucher_code = %voucher.code,
            voucher_id = %voucher.id,
            sale_id = %existing.id,
            "sale already recorded, skipping"
        );
        return Ok(false);
    }

    let sale = NewSale {
        voucher_id: voucher.id.clone(),
        seller_id: voucher.seller_id.clone(),
        site_id: voucher.site_id.clone(),
        amount: pricing.unit_price.unwrap_or(voucher.unit_price),
        currency: pricing
            .currency
            .clone()
            .unwrap_or_else(|| default_currency.to_owned()),
        source: SaleSource::OmadaSync,
        sold_at: remote.started_at().unwrap_or_else(Utc::now),
        note: Some(AUTO_SYNC_NOTE.to_owned()),
    };

    match store.create_sale(sale).await {
        Ok(sale) => {
            info!(
                voucher_code = %voucher.code,
                voucher_id = %voucher.id,
                sale_id = %sale.id,
                amount = %sale.amount,
                currency = %sale.currency,
                "sale recorded"
            );
            Ok(true)
        }
        Err(StoreError::DuplicateSale { .. }) => {
            info!(
                voucher_code = %voucher.code,
                voucher_id = %voucher.id,
                "sale recorded concurrently, skipping"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

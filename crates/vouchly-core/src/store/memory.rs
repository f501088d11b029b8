// ── In-process store ──
//
// `DashMap`-backed implementation for tests and dry runs. Sales are
// keyed by voucher id, so the entry API enforces one sale per voucher
// atomically.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use vouchly_api::OmadaCredentials;

use super::VoucherStore;
use crate::error::StoreError;
use crate::model::{LocalVoucherStatus, NewSale, NewVoucher, Sale, SaleSource, Site, Voucher};

#[derive(Default)]
pub struct MemoryStore {
    /// site id -> (insertion sequence, site)
    sites: DashMap<String, (u64, Site)>,
    site_seq: AtomicU64,
    vouchers: DashMap<String, Voucher>,
    /// code -> voucher id
    codes: DashMap<String, String>,
    /// voucher id -> sale
    sales: DashMap<String, Sale>,
    credentials: ArcSwapOption<OmadaCredentials>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a voucher up by id.
    pub fn voucher(&self, id: &str) -> Option<Voucher> {
        self.vouchers.get(id).map(|v| v.clone())
    }

    pub fn sale_count(&self) -> usize {
        self.sales.len()
    }
}

impl VoucherStore for MemoryStore {
    async fn get_all_sites(&self) -> Result<Vec<Site>, StoreError> {
        let mut sites: Vec<(u64, Site)> = self.sites.iter().map(|e| e.value().clone()).collect();
        sites.sort_by_key(|(seq, _)| *seq);
        Ok(sites.into_iter().map(|(_, site)| site).collect())
    }

    async fn get_omada_credentials(&self) -> Result<Option<OmadaCredentials>, StoreError> {
        Ok(self.credentials.load_full().map(|c| (*c).clone()))
    }

    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, StoreError> {
        let Some(id) = self.codes.get(code).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.voucher(&id))
    }

    async fn update_voucher_status_by_id(
        &self,
        id: &str,
        status: LocalVoucherStatus,
        used_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut voucher = self
            .vouchers
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("Voucher", id))?;
        voucher.status = status;
        if used_at.is_some() {
            voucher.used_at = used_at;
        }
        Ok(())
    }

    async fn get_sale_by_voucher_id(&self, voucher_id: &str) -> Result<Option<Sale>, StoreError> {
        Ok(self.sales.get(voucher_id).map(|s| s.clone()))
    }

    async fn create_sale(&self, sale: NewSale) -> Result<Sale, StoreError> {
        match self.sales.entry(sale.voucher_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateSale {
                voucher_id: sale.voucher_id,
            }),
            Entry::Vacant(slot) => {
                let sale = sale.into_sale();
                slot.insert(sale.clone());
                Ok(sale)
            }
        }
    }

    async fn upsert_site(&self, site: Site) -> Result<(), StoreError> {
        match self.sites.entry(site.id.clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().1 = site,
            Entry::Vacant(slot) => {
                let seq = self.site_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert((seq, site));
            }
        }
        Ok(())
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, StoreError> {
        let voucher = voucher.into_voucher();
        match self.codes.entry(voucher.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Database(format!(
                "voucher code already exists: {}",
                voucher.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(voucher.id.clone());
                self.vouchers.insert(voucher.id.clone(), voucher.clone());
                Ok(voucher)
            }
        }
    }

    async fn set_omada_credentials(&self, credentials: OmadaCredentials) -> Result<(), StoreError> {
        self.credentials.store(Some(Arc::new(credentials)));
        Ok(())
    }

    async fn list_sales_by_source(
        &self,
        source: Option<SaleSource>,
    ) -> Result<Vec<Sale>, StoreError> {
        let mut sales: Vec<Sale> = self
            .sales
            .iter()
            .filter(|s| source.is_none_or(|wanted| s.source == wanted))
            .map(|s| s.clone())
            .collect();
        sales.sort_by(|a, b| a.sold_at.cmp(&b.sold_at).then_with(|| a.id.cmp(&b.id)));
        Ok(sales)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::model::AUTO_SYNC_NOTE;

    fn new_sale(voucher_id: &str) -> NewSale {
        NewSale {
            voucher_id: voucher_id.into(),
            seller_id: None,
            site_id: "s1".into(),
            amount: Decimal::new(1000, 2),
            currency: "BRL".into(),
            source: SaleSource::OmadaSync,
            sold_at: Utc::now(),
            note: Some(AUTO_SYNC_NOTE.into()),
        }
    }

    #[tokio::test]
    async fn second_sale_for_voucher_is_rejected() {
        let store = MemoryStore::new();
        store.create_sale(new_sale("v1")).await.unwrap();

        let err = store.create_sale(new_sale("v1")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSale { voucher_id } if voucher_id == "v1"));
        assert_eq!(store.sale_count(), 1);
    }

    #[tokio::test]
    async fn sites_keep_insertion_order_across_updates() {
        let store = MemoryStore::new();
        for id in ["b", "a", "c"] {
            store.upsert_site(Site::new(id, id, None)).await.unwrap();
        }
        store
            .upsert_site(Site::new("a", "renamed", Some("x".into())))
            .await
            .unwrap();

        let sites = store.get_all_sites().await.unwrap();
        let ids: Vec<_> = sites.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert_eq!(sites[1].name, "renamed");
    }

    #[tokio::test]
    async fn status_update_keeps_used_at_when_not_given() {
        let store = MemoryStore::new();
        let v = store
            .insert_voucher(NewVoucher::new("AB12CD", "s1", Decimal::new(500, 2)))
            .await
            .unwrap();

        let at = Utc::now();
        store
            .update_voucher_status_by_id(&v.id, LocalVoucherStatus::InUse, Some(at))
            .await
            .unwrap();
        store
            .update_voucher_status_by_id(&v.id, LocalVoucherStatus::Expired, None)
            .await
            .unwrap();

        let v = store.get_voucher_by_code("AB12CD").await.unwrap().unwrap();
        assert_eq!(v.status, LocalVoucherStatus::Expired);
        assert_eq!(v.used_at, Some(at));
    }

    #[tokio::test]
    async fn unknown_voucher_update_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_voucher_status_by_id("missing", LocalVoucherStatus::InUse, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}

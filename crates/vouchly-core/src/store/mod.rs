// ── Persistence contract ──
//
// The sync engine only needs a handful of reads and writes. Both
// backends enforce at most one sale per voucher at insert time, which
// the sale guard relies on when two sweeps race.

mod memory;
mod sqlite;

use std::future::Future;

use chrono::{DateTime, Utc};
use vouchly_api::OmadaCredentials;

use crate::error::StoreError;
use crate::model::{LocalVoucherStatus, NewSale, NewVoucher, Sale, SaleSource, Site, Voucher};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage operations used by [`SyncService`](crate::SyncService) and the
/// administrative CLI commands.
pub trait VoucherStore: Send + Sync + 'static {
    // ── Sync contract ────────────────────────────────────────────────

    /// Every known site, in a stable order.
    fn get_all_sites(&self) -> impl Future<Output = Result<Vec<Site>, StoreError>> + Send;

    fn get_omada_credentials(
        &self,
    ) -> impl Future<Output = Result<Option<OmadaCredentials>, StoreError>> + Send;

    fn get_voucher_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Voucher>, StoreError>> + Send;

    /// Set a voucher's status. `used_at`, when given, is recorded too;
    /// `None` leaves the stored value untouched.
    fn update_voucher_status_by_id(
        &self,
        id: &str,
        status: LocalVoucherStatus,
        used_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_sale_by_voucher_id(
        &self,
        voucher_id: &str,
    ) -> impl Future<Output = Result<Option<Sale>, StoreError>> + Send;

    /// Insert a sale. Fails with [`StoreError::DuplicateSale`] if the
    /// voucher already has one.
    fn create_sale(&self, sale: NewSale) -> impl Future<Output = Result<Sale, StoreError>> + Send;

    // ── Administration ───────────────────────────────────────────────

    fn upsert_site(&self, site: Site) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn insert_voucher(
        &self,
        voucher: NewVoucher,
    ) -> impl Future<Output = Result<Voucher, StoreError>> + Send;

    /// Replace the single controller credentials record.
    fn set_omada_credentials(
        &self,
        credentials: OmadaCredentials,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Sales ordered by sale time, optionally restricted to one source.
    fn list_sales_by_source(
        &self,
        source: Option<SaleSource>,
    ) -> impl Future<Output = Result<Vec<Sale>, StoreError>> + Send;
}

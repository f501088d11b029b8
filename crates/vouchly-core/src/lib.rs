//! Voucher status reconciliation between an Omada controller and the
//! local sales ledger.
//!
//! - **[`SyncService`]** — orchestrates sweeps over every active site:
//!   site → voucher groups → vouchers. Exposes a start/stop timer, forced
//!   single-site sync, and a [`SyncStatus`] snapshot.
//!
//! - **Reconciliation** ([`reconcile`]) — the status state machine. Local
//!   status only ever moves forward; a remote regression is logged and
//!   never applied.
//!
//! - **Sale guard** ([`sale::ensure_sale_recorded`]) — the only place sync
//!   creates sales, keeping at most one per voucher.
//!
//! - **Persistence** ([`store`]) — the [`VoucherStore`] contract, with a
//!   `DashMap`-backed [`MemoryStore`] and a sqlx [`SqliteStore`].

pub mod config;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod sale;
pub mod service;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::SyncConfig;
pub use error::{CoreError, StoreError};
pub use model::{
    AUTO_SYNC_NOTE, LocalVoucherStatus, NewSale, NewVoucher, Sale, SaleSource, Site, SiteStatus,
    Voucher,
};
pub use reconcile::{OutcomeKind, Transition, VoucherOutcome};
pub use report::{GroupReport, SiteReport, SweepReport};
pub use sale::GroupPricing;
pub use service::{SyncService, SyncStatus};
pub use store::{MemoryStore, SqliteStore, VoucherStore};

// Controller-facing types callers need to seed credentials.
pub use vouchly_api::{OmadaCredentials, TlsMode, TransportConfig};

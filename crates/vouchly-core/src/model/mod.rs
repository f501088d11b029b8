// ── Domain model ──
//
// Local records the reconciliation engine reads and writes. Remote
// shapes live in `vouchly_api::types` and never leak past the engine.

pub mod sale;
pub mod site;
pub mod voucher;

pub use sale::{AUTO_SYNC_NOTE, NewSale, Sale, SaleSource};
pub use site::{Site, SiteStatus};
pub use voucher::{LocalVoucherStatus, NewVoucher, Voucher};

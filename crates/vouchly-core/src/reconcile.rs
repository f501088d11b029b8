// ── Reconciliation engine ──
//
// Compares one remote voucher against its local record (matched by code)
// and moves the local status forward. The decision is a pure function of
// the two statuses; `reconcile_voucher` applies it against a store.
//
//   remote \ local | Available        | InUse            | Expired
//   ---------------+------------------+------------------+-----------------
//   Unused         | unchanged        | regression       | regression
//   InUse          | consume + sale   | unchanged        | lateral
//   Expired        | consume + sale   | lateral          | unchanged

use chrono::Utc;
use tracing::{debug, error, info, warn};
use vouchly_api::{RemoteVoucherStatus, Voucher as RemoteVoucher};

use crate::error::StoreError;
use crate::model::LocalVoucherStatus;
use crate::sale::{GroupPricing, ensure_sale_recorded};
use crate::store::VoucherStore;

/// What reconciliation should do for a (remote, local) status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Statuses already agree.
    Unchanged,
    /// Remote reports `Unused` for a voucher already consumed locally.
    /// Never applied.
    Regression,
    /// `Available` -> consumed. Records a sale.
    Consume { to: LocalVoucherStatus },
    /// `InUse` <-> `Expired`. Status only.
    Lateral { to: LocalVoucherStatus },
}

pub fn decide(remote: RemoteVoucherStatus, local: LocalVoucherStatus) -> Transition {
    let target = LocalVoucherStatus::from(remote);
    match (local, target) {
        (l, t) if l == t => Transition::Unchanged,
        (_, LocalVoucherStatus::Available) => Transition::Regression,
        (LocalVoucherStatus::Available, to) => Transition::Consume { to },
        (_, to) => Transition::Lateral { to },
    }
}

/// How a single remote voucher was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// No local voucher carries this code.
    Unmatched,
    Unchanged,
    Regression,
    Consumed,
    Lateral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoucherOutcome {
    pub kind: OutcomeKind,
    pub updated: bool,
    pub sale_created: bool,
}

impl VoucherOutcome {
    fn untouched(kind: OutcomeKind) -> Self {
        Self {
            kind,
            updated: false,
            sale_created: false,
        }
    }
}

/// Reconcile one remote voucher against the store.
///
/// On a consuming transition the sale is ensured before the status is
/// written: if the status write fails, the next pass still sees
/// `Available` and retries, and the sale guard keeps it to one sale.
pub async fn reconcile_voucher<S: VoucherStore>(
    store: &S,
    pricing: &GroupPricing,
    remote: &RemoteVoucher,
    default_currency: &str,
) -> Result<VoucherOutcome, StoreError> {
    let Some(local) = store.get_voucher_by_code(&remote.code).await? else {
        warn!(voucher_code = %remote.code, "no local voucher for remote code, skipping");
        return Ok(VoucherOutcome::untouched(OutcomeKind::Unmatched));
    };

    match decide(remote.status, local.status) {
        Transition::Unchanged => {
            debug!(voucher_code = %local.code, status = %local.status, "already in sync");
            Ok(VoucherOutcome::untouched(OutcomeKind::Unchanged))
        }
        Transition::Regression => {
            error!(
                voucher_code = %local.code,
                voucher_id = %local.id,
                local_status = %local.status,
                remote_status = ?remote.status,
                "remote status regressed below local status, not reverting"
            );
            Ok(VoucherOutcome::untouched(OutcomeKind::Regression))
        }
        Transition::Consume { to } => {
            let sale_created =
                ensure_sale_recorded(store, &local, pricing, remote, default_currency).await?;
            let used_at = remote.started_at().unwrap_or_else(Utc::now);
            store
                .update_voucher_status_by_id(&local.id, to, Some(used_at))
                .await?;

            info!(
                voucher_code = %local.code,
                voucher_id = %local.id,
                from = %local.status,
                to = %to,
                sale_created,
                "voucher consumed"
            );
            Ok(VoucherOutcome {
                kind: OutcomeKind::Consumed,
                updated: true,
                sale_created,
            })
        }
        Transition::Lateral { to } => {
            store
                .update_voucher_status_by_id(&local.id, to, None)
                .await?;

            info!(
                voucher_code = %local.code,
                voucher_id = %local.id,
                from = %local.status,
                to = %to,
                "voucher status updated"
            );
            Ok(VoucherOutcome {
                kind: OutcomeKind::Lateral,
                updated: true,
                sale_created: false,
            })
        }
    }
}

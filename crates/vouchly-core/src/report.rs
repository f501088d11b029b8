// ── Sweep statistics ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use vouchly_api::VoucherGroup;

use crate::model::Site;
use crate::reconcile::{OutcomeKind, VoucherOutcome};

/// Counters for one voucher group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub group_id: String,
    pub group_name: String,
    pub vouchers_seen: usize,
    pub vouchers_updated: usize,
    pub sales_created: usize,
    pub unmatched: usize,
    pub regressions: usize,
    /// Vouchers whose local update failed.
    pub failed: usize,
    /// The voucher listing stopped early.
    pub partial: bool,
    pub error: Option<String>,
}

impl GroupReport {
    pub(crate) fn new(group: &VoucherGroup) -> Self {
        Self {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: VoucherOutcome) {
        self.vouchers_seen += 1;
        self.vouchers_updated += usize::from(outcome.updated);
        self.sales_created += usize::from(outcome.sale_created);
        match outcome.kind {
            OutcomeKind::Unmatched => self.unmatched += 1,
            OutcomeKind::Regression => self.regressions += 1,
            OutcomeKind::Unchanged | OutcomeKind::Consumed | OutcomeKind::Lateral => {}
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.vouchers_seen += 1;
        self.failed += 1;
    }

    pub(crate) fn mark_partial(&mut self, reason: impl Into<String>) {
        self.partial = true;
        self.error.get_or_insert_with(|| reason.into());
    }
}

/// Counters for one site, summed over its groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub site_id: String,
    pub site_name: String,
    pub groups: usize,
    pub vouchers_seen: usize,
    pub vouchers_updated: usize,
    pub sales_created: usize,
    pub unmatched: usize,
    pub regressions: usize,
    pub failed: usize,
    /// Some listing for this site stopped early; results are incomplete.
    pub partial: bool,
    /// First error seen, or the error that aborted the site.
    pub error: Option<String>,
}

impl SiteReport {
    pub(crate) fn new(site: &Site) -> Self {
        Self {
            site_id: site.id.clone(),
            site_name: site.name.clone(),
            ..Self::default()
        }
    }

    /// A site that could not be synced at all.
    pub(crate) fn aborted(site: &Site, error: &impl std::fmt::Display) -> Self {
        Self {
            partial: true,
            error: Some(error.to_string()),
            ..Self::new(site)
        }
    }

    pub(crate) fn absorb(&mut self, group: &GroupReport) {
        self.groups += 1;
        self.vouchers_seen += group.vouchers_seen;
        self.vouchers_updated += group.vouchers_updated;
        self.sales_created += group.sales_created;
        self.unmatched += group.unmatched;
        self.regressions += group.regressions;
        self.failed += group.failed;
        if group.partial {
            self.partial = true;
        }
        if self.error.is_none() {
            self.error.clone_from(&group.error);
        }
    }

    pub(crate) fn mark_partial(&mut self, reason: impl Into<String>) {
        self.partial = true;
        self.error.get_or_insert_with(|| reason.into());
    }

    pub fn is_clean(&self) -> bool {
        !self.partial && self.failed == 0 && self.error.is_none()
    }
}

/// Result of one pass over every syncable site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sites: Vec<SiteReport>,
}

impl SweepReport {
    pub fn vouchers_updated(&self) -> usize {
        self.sites.iter().map(|s| s.vouchers_updated).sum()
    }

    pub fn sales_created(&self) -> usize {
        self.sites.iter().map(|s| s.sales_created).sum()
    }

    pub fn failed_sites(&self) -> usize {
        self.sites.iter().filter(|s| !s.is_clean()).count()
    }

    pub fn site(&self, site_id: &str) -> Option<&SiteReport> {
        self.sites.iter().find(|s| s.site_id == site_id)
    }
}

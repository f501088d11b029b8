// ── Sync orchestrator ──
//
// Drives sweeps over every syncable site: site -> voucher groups ->
// vouchers -> reconciliation. Failures are contained at the level they
// happen (page, voucher, site) and never reach the timer task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vouchly_api::{OmadaClient, OmadaCredentials, TokenManager, VoucherGroup};

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::model::Site;
use crate::reconcile::reconcile_voucher;
use crate::report::{GroupReport, SiteReport, SweepReport};
use crate::sale::GroupPricing;
use crate::store::VoucherStore;

/// Shortest timer period accepted; a zero interval would spin.
const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

// ── SyncStatus ───────────────────────────────────────────────────────

/// Read-only snapshot returned by [`SyncService::get_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub is_running: bool,
    /// When the last full sweep finished, successfully or not.
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_interval: Duration,
}

// ── SyncService ──────────────────────────────────────────────────────

/// Voucher status sync service.
///
/// Cheaply cloneable via `Arc<SyncInner>`. Owns the token cache, so every
/// sweep, scheduled or forced, shares one access token.
pub struct SyncService<S: VoucherStore> {
    inner: Arc<SyncInner<S>>,
}

impl<S: VoucherStore> Clone for SyncService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SyncInner<S> {
    store: Arc<S>,
    config: SyncConfig,
    http: reqwest::Client,
    tokens: TokenManager,
    running: AtomicBool,
    last_sync_time: ArcSwapOption<DateTime<Utc>>,
    timer: Mutex<Option<TimerHandle>>,
}

struct TimerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything needed to talk to one controller during one site pass.
///
/// `token` is swapped for a fresh one when the controller rejects it
/// part way through the pass.
struct Session<'a> {
    client: OmadaClient,
    creds: &'a OmadaCredentials,
    token: SecretString,
    remote_site_id: &'a str,
}

impl<S: VoucherStore> SyncService<S> {
    /// Build a service with its own HTTP client from `config.transport`.
    pub fn new(store: Arc<S>, config: SyncConfig) -> Result<Self, CoreError> {
        let http = config.transport.build_client()?;
        Ok(Self::with_http_client(store, config, http))
    }

    pub fn with_http_client(store: Arc<S>, config: SyncConfig, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                store,
                config,
                tokens: TokenManager::new(http.clone()),
                http,
                running: AtomicBool::new(false),
                last_sync_time: ArcSwapOption::empty(),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the timer. The first sweep runs immediately, then one per
    /// interval. Returns `false` (and does nothing) if already running.
    pub async fn start_auto_sync(&self) -> bool {
        let mut timer = self.inner.timer.lock().await;
        if timer.is_some() {
            info!("auto-sync already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(auto_sync_task(self.clone(), cancel.clone()));
        *timer = Some(TimerHandle { cancel, task });
        self.inner.running.store(true, Ordering::SeqCst);

        info!(
            interval_secs = self.inner.config.interval.as_secs(),
            "auto-sync started"
        );
        true
    }

    /// Stop the timer and wait for its task to exit. An in-flight sweep
    /// is cancelled between pages and vouchers. Returns `false` if the
    /// timer was not running.
    pub async fn stop_auto_sync(&self) -> bool {
        let handle = self.inner.timer.lock().await.take();
        let Some(handle) = handle else {
            debug!("auto-sync not running");
            return false;
        };

        self.inner.running.store(false, Ordering::SeqCst);
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            warn!(error = %e, "auto-sync task ended abnormally");
        }

        info!("auto-sync stopped");
        true
    }

    pub fn get_status(&self) -> SyncStatus {
        SyncStatus {
            is_running: self.inner.running.load(Ordering::SeqCst),
            last_sync_time: self.inner.last_sync_time.load_full().map(|t| *t),
            sync_interval: self.inner.config.interval,
        }
    }

    // ── One-shot operations ──────────────────────────────────────────

    /// Sweep every active, mapped site once.
    ///
    /// Per-site failures are recorded in the report, not returned. Only a
    /// failure to list sites fails the sweep.
    pub async fn sync_all_sites(&self) -> Result<SweepReport, CoreError> {
        self.sweep(&CancellationToken::new()).await
    }

    /// Sync one site regardless of the timer.
    pub async fn force_site_sync(&self, site_id: &str) -> Result<SiteReport, CoreError> {
        let site = self
            .inner
            .store
            .get_all_sites()
            .await?
            .into_iter()
            .find(|s| s.id == site_id)
            .ok_or_else(|| CoreError::SiteNotFound {
                site_id: site_id.to_owned(),
            })?;

        info!(site_id = %site.id, site_name = %site.name, "forced site sync");
        self.sync_site_vouchers(&site).await
    }

    /// Sync every voucher group of `site`.
    pub async fn sync_site_vouchers(&self, site: &Site) -> Result<SiteReport, CoreError> {
        self.sync_site(site, &CancellationToken::new()).await
    }

    /// Sync a single voucher group of `site`.
    pub async fn sync_voucher_group(
        &self,
        site: &Site,
        group: &VoucherGroup,
    ) -> Result<GroupReport, CoreError> {
        let remote_site_id = syncable(site)?;
        let creds = self.credentials().await?;
        let mut session = self.open_session(&creds, remote_site_id).await?;
        self.sync_group(&mut session, site, group, &CancellationToken::new())
            .await
    }

    // ── Sweep internals ──────────────────────────────────────────────

    async fn sweep(&self, cancel: &CancellationToken) -> Result<SweepReport, CoreError> {
        let started_at = Utc::now();
        let sites = self.inner.store.get_all_sites().await?;
        let mut reports = Vec::new();

        for site in &sites {
            if cancel.is_cancelled() {
                info!("sync sweep cancelled");
                break;
            }
            if let Some(reason) = site.unsyncable_reason() {
                debug!(site_id = %site.id, reason, "skipping site");
                continue;
            }

            match self.sync_site(site, cancel).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!(
                        site_id = %site.id,
                        site_name = %site.name,
                        error = %e,
                        "site sync failed"
                    );
                    reports.push(SiteReport::aborted(site, &e));
                }
            }
        }

        let finished_at = Utc::now();
        self.inner.last_sync_time.store(Some(Arc::new(finished_at)));

        let report = SweepReport {
            started_at,
            finished_at,
            sites: reports,
        };
        info!(
            sites = report.sites.len(),
            failed_sites = report.failed_sites(),
            vouchers_updated = report.vouchers_updated(),
            sales_created = report.sales_created(),
            "sync sweep finished"
        );
        Ok(report)
    }

    /// One site, retried once with a fresh token if the controller
    /// rejects the cached one.
    async fn sync_site(
        &self,
        site: &Site,
        cancel: &CancellationToken,
    ) -> Result<SiteReport, CoreError> {
        let remote_site_id = syncable(site)?;
        let creds = self.credentials().await?;

        match self.sync_site_once(site, remote_site_id, &creds, cancel).await {
            Err(e) if e.is_token_rejected() => {
                warn!(
                    site_id = %site.id,
                    error = %e,
                    "access token rejected, retrying with a new token"
                );
                self.inner.tokens.invalidate();
                self.sync_site_once(site, remote_site_id, &creds, cancel)
                    .await
            }
            other => other,
        }
    }

    async fn sync_site_once(
        &self,
        site: &Site,
        remote_site_id: &str,
        creds: &OmadaCredentials,
        cancel: &CancellationToken,
    ) -> Result<SiteReport, CoreError> {
        let mut session = self.open_session(creds, remote_site_id).await?;
        let groups = session
            .client
            .list_all_voucher_groups(remote_site_id, &session.token, cancel)
            .await;

        let mut report = SiteReport::new(site);
        if let Some(err) = groups.error {
            if err.is_auth_expired() {
                return Err(err.into());
            }
            warn!(
                site_id = %site.id,
                site_name = %site.name,
                groups_listed = groups.items.len(),
                error = %err,
                "voucher group listing incomplete"
            );
            report.mark_partial(err.to_string());
        }

        for group in &groups.items {
            if cancel.is_cancelled() {
                report.mark_partial("sync cancelled");
                break;
            }
            let group_report = self.sync_group(&mut session, site, group, cancel).await?;
            report.absorb(&group_report);
        }

        info!(
            site_id = %site.id,
            site_name = %site.name,
            groups = report.groups,
            vouchers = report.vouchers_seen,
            updated = report.vouchers_updated,
            sales_created = report.sales_created,
            partial = report.partial,
            "site synced"
        );
        Ok(report)
    }

    /// One voucher group. A token rejected during the voucher walk is
    /// replaced and the group walked again once; the new token stays in
    /// `session` for the remaining groups. Only a failed renewal is an
    /// error, every other failure ends up in the report.
    async fn sync_group(
        &self,
        session: &mut Session<'_>,
        site: &Site,
        group: &VoucherGroup,
        cancel: &CancellationToken,
    ) -> Result<GroupReport, CoreError> {
        let mut detail = session
            .client
            .list_all_vouchers(session.remote_site_id, &group.id, &session.token, cancel)
            .await;

        if detail
            .vouchers
            .error
            .as_ref()
            .is_some_and(vouchly_api::Error::is_auth_expired)
        {
            warn!(
                site_id = %site.id,
                group_id = %group.id,
                "access token rejected during voucher listing, renewing"
            );
            self.inner.tokens.invalidate();
            session.token = self.inner.tokens.get_valid_token(session.creds).await?;
            detail = session
                .client
                .list_all_vouchers(session.remote_site_id, &group.id, &session.token, cancel)
                .await;
        }

        let pricing = GroupPricing::resolve(group, &detail);
        let mut report = GroupReport::new(group);

        if let Some(err) = &detail.vouchers.error {
            warn!(
                site_id = %site.id,
                group_id = %group.id,
                vouchers_listed = detail.vouchers.items.len(),
                error = %err,
                "voucher listing incomplete"
            );
            report.mark_partial(err.to_string());
        }

        let store = self.inner.store.as_ref();
        let currency = self.inner.config.default_currency.as_str();
        for remote in &detail.vouchers.items {
            if cancel.is_cancelled() {
                report.mark_partial("sync cancelled");
                break;
            }
            match reconcile_voucher(store, &pricing, remote, currency).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(
                        site_id = %site.id,
                        group_id = %group.id,
                        voucher_code = %remote.code,
                        error = %e,
                        "voucher reconciliation failed"
                    );
                    report.record_failure();
                }
            }
        }

        info!(
            site_id = %site.id,
            group_id = %group.id,
            group_name = %group.name,
            vouchers = report.vouchers_seen,
            updated = report.vouchers_updated,
            sales_created = report.sales_created,
            "voucher group synced"
        );
        Ok(report)
    }

    async fn credentials(&self) -> Result<OmadaCredentials, CoreError> {
        self.inner
            .store
            .get_omada_credentials()
            .await?
            .ok_or(CoreError::NoCredentials)
    }

    async fn open_session<'a>(
        &self,
        creds: &'a OmadaCredentials,
        remote_site_id: &'a str,
    ) -> Result<Session<'a>, CoreError> {
        let token = self.inner.tokens.get_valid_token(creds).await?;
        let client = OmadaClient::for_credentials(self.inner.http.clone(), creds).with_page_sizes(
            self.inner.config.group_page_size,
            self.inner.config.voucher_page_size,
        );
        Ok(Session {
            client,
            creds,
            token,
            remote_site_id,
        })
    }
}

fn syncable(site: &Site) -> Result<&str, CoreError> {
    site.syncable_remote_id()
        .ok_or_else(|| CoreError::SiteNotSyncable {
            site_id: site.id.clone(),
            reason: site
                .unsyncable_reason()
                .unwrap_or("site is not syncable")
                .to_owned(),
        })
}

// ── Timer task ───────────────────────────────────────────────────────

/// Runs a sweep on every tick until cancelled. Each sweep runs in its own
/// task so a panic is logged instead of ending the timer.
async fn auto_sync_task<S: VoucherStore>(service: SyncService<S>, cancel: CancellationToken) {
    let period = service.inner.config.interval.max(MIN_SYNC_INTERVAL);
    let overrun = service.inner.config.overrun_threshold();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        let sweep = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { service.sweep(&cancel).await })
        };

        match sweep.await {
            Ok(Ok(report)) => debug!(sites = report.sites.len(), "scheduled sweep complete"),
            Ok(Err(e)) => error!(error = %e, "scheduled sync sweep failed"),
            Err(e) => error!(error = %e, "scheduled sync sweep panicked"),
        }

        warn_if_overrun(started.elapsed(), period, overrun);
    }

    debug!("auto-sync task exited");
}

/// Logs a warning when a sweep took at least `threshold`. Returns whether
/// it did.
fn warn_if_overrun(elapsed: Duration, period: Duration, threshold: Duration) -> bool {
    if elapsed < threshold {
        return false;
    }
    warn!(
        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        "sync sweep is approaching or exceeding the sync interval"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrun_warning_starts_at_threshold() {
        let config = SyncConfig {
            interval: Duration::from_secs(10),
            overrun_warn_ratio: 0.8,
            ..SyncConfig::default()
        };
        let threshold = config.overrun_threshold();

        assert!(!warn_if_overrun(Duration::from_secs(7), config.interval, threshold));
        assert!(warn_if_overrun(Duration::from_secs(8), config.interval, threshold));
        assert!(warn_if_overrun(Duration::from_secs(12), config.interval, threshold));
    }

    #[test]
    fn zero_ratio_warns_on_every_sweep() {
        let config = SyncConfig {
            overrun_warn_ratio: 0.0,
            ..SyncConfig::default()
        };
        assert!(warn_if_overrun(
            Duration::ZERO,
            config.interval,
            config.overrun_threshold()
        ));
    }
}

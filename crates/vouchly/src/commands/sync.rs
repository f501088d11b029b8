//! Sync command handlers: the long-running loop and one-shot sweeps.
//!
//! Every path goes through `SyncService`; nothing here talks to the
//! controller directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use vouchly_config::Config;
use vouchly_core::{SiteReport, SqliteStore, SweepReport, SyncService, SyncStatus, VoucherStore};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SiteReportRow {
    #[tabled(rename = "Site")]
    site: String,
    #[tabled(rename = "Groups")]
    groups: usize,
    #[tabled(rename = "Seen")]
    seen: usize,
    #[tabled(rename = "Updated")]
    updated: usize,
    #[tabled(rename = "Sales")]
    sales: usize,
    #[tabled(rename = "Unmatched")]
    unmatched: usize,
    #[tabled(rename = "Regressions")]
    regressions: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Result")]
    result: String,
}

impl From<&SiteReport> for SiteReportRow {
    fn from(r: &SiteReport) -> Self {
        let result = match (&r.error, r.partial) {
            (None, false) if r.failed == 0 => "ok".to_owned(),
            (None, _) => "incomplete".to_owned(),
            (Some(e), _) => e.clone(),
        };
        Self {
            site: format!("{} ({})", r.site_name, r.site_id),
            groups: r.groups,
            seen: r.vouchers_seen,
            updated: r.vouchers_updated,
            sales: r.sales_created,
            unmatched: r.unmatched,
            regressions: r.regressions,
            failed: r.failed,
            result,
        }
    }
}

/// Serializable form of `SyncStatus`.
#[derive(Serialize)]
struct StatusView {
    is_running: bool,
    last_sync_time: Option<DateTime<Utc>>,
    sync_interval_secs: u64,
}

impl From<SyncStatus> for StatusView {
    fn from(s: SyncStatus) -> Self {
        Self {
            is_running: s.is_running,
            last_sync_time: s.last_sync_time,
            sync_interval_secs: s.sync_interval.as_secs(),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

fn service(
    store: &Arc<SqliteStore>,
    config: &Config,
) -> Result<SyncService<SqliteStore>, CliError> {
    Ok(SyncService::new(Arc::clone(store), config.to_sync_config()?)?)
}

async fn require_credentials<S: VoucherStore>(store: &S) -> Result<(), CliError> {
    match store.get_omada_credentials().await? {
        Some(_) => Ok(()),
        None => Err(CliError::NoCredentials),
    }
}

/// Run the timer until Ctrl-C, then print the final status snapshot.
pub async fn run(
    store: &Arc<SqliteStore>,
    config: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    require_credentials(store.as_ref()).await?;
    let service = service(store, config)?;

    service.start_auto_sync().await;
    tracing::info!(
        interval_secs = service.config().interval.as_secs(),
        "sync loop running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    service.stop_auto_sync().await;

    let status = StatusView::from(service.get_status());
    let out = output::render_single(global.output, &status, status_detail, |s| {
        s.last_sync_time.map(|t| t.to_rfc3339()).unwrap_or_default()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// One sweep over every syncable site.
pub async fn sync_all(
    store: &Arc<SqliteStore>,
    config: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    require_credentials(store.as_ref()).await?;
    let report = service(store, config)?.sync_all_sites().await?;

    print_sites(&report.sites, global)?;
    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        eprintln!("{}", sweep_summary(&report, output::should_color(global.color)));
    }

    match report.failed_sites() {
        0 => Ok(()),
        failed => Err(CliError::SyncIncomplete {
            failed,
            total: report.sites.len(),
        }),
    }
}

/// Forced sync of one site.
pub async fn sync_site(
    store: &Arc<SqliteStore>,
    config: &Config,
    site_id: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let report = service(store, config)?.force_site_sync(site_id).await?;
    let clean = report.is_clean();
    print_sites(std::slice::from_ref(&report), global)?;

    if clean {
        Ok(())
    } else {
        Err(CliError::SyncIncomplete {
            failed: 1,
            total: 1,
        })
    }
}

// ── Rendering ───────────────────────────────────────────────────────

fn print_sites(sites: &[SiteReport], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        sites,
        |r| SiteReportRow::from(r),
        |r| r.site_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn sweep_summary(report: &SweepReport, color: bool) -> String {
    let elapsed = (report.finished_at - report.started_at)
        .to_std()
        .unwrap_or_default();
    let failed = report.failed_sites();
    let headline = format!(
        "{} site(s) synced: {} voucher(s) updated, {} sale(s) recorded",
        report.sites.len(),
        report.vouchers_updated(),
        report.sales_created(),
    );
    let timing = format!("in {:.1}s", elapsed.as_secs_f64());

    let mut line = format!(
        "{} {}",
        output::paint_health(&headline, failed == 0, color),
        output::paint_dim(&timing, color)
    );
    if failed > 0 {
        line.push_str(&format!(", {failed} incomplete"));
    }
    line
}

fn status_detail(s: &StatusView) -> String {
    output::render_fields(&[
        ("running", s.is_running.to_string()),
        (
            "last_sync",
            s.last_sync_time
                .map_or_else(|| "never".into(), |t| t.to_rfc3339()),
        ),
        ("interval", format!("{}s", s.sync_interval_secs)),
    ])
}

//! Site command handlers.

use tabled::Tabled;
use vouchly_core::{Site, SiteStatus, VoucherStore};

use crate::cli::{GlobalOpts, SitesArgs, SitesCommand};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Omada Site")]
    omada_site_id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Sync")]
    sync: String,
}

impl From<&Site> for SiteRow {
    fn from(s: &Site) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            omada_site_id: s.omada_site_id.clone().unwrap_or_else(|| "-".into()),
            status: s.status.to_string(),
            sync: s.unsyncable_reason().unwrap_or("yes").into(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle<S: VoucherStore>(
    store: &S,
    args: SitesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SitesCommand::List => {
            let sites = store.get_all_sites().await?;
            let out = output::render_list(
                global.output,
                &sites,
                |s| SiteRow::from(s),
                |s| s.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SitesCommand::Add {
            id,
            name,
            omada_site_id,
            inactive,
        } => {
            let site = build_site(id, name, omada_site_id, inactive)?;
            tracing::debug!(site_id = %site.id, status = %site.status, "upserting site");
            store.upsert_site(site.clone()).await?;
            if !global.quiet {
                match site.unsyncable_reason() {
                    None => eprintln!("Site '{}' saved", site.id),
                    Some(reason) => eprintln!("Site '{}' saved ({reason}, not synced)", site.id),
                }
            }
            Ok(())
        }
    }
}

fn build_site(
    id: String,
    name: String,
    omada_site_id: Option<String>,
    inactive: bool,
) -> Result<Site, CliError> {
    let id = id.trim().to_owned();
    if id.is_empty() {
        return Err(CliError::Validation {
            field: "id".into(),
            reason: "must not be empty".into(),
        });
    }
    let omada_site_id = omada_site_id
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());

    let mut site = Site::new(id, name, omada_site_id);
    if inactive {
        site.status = SiteStatus::Inactive;
    }
    Ok(site)
}

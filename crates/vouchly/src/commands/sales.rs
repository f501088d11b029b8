//! Sales command handlers.

use tabled::Tabled;
use vouchly_core::{Sale, SaleSource, VoucherStore};

use crate::cli::{GlobalOpts, SalesArgs, SalesCommand};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SaleRow {
    #[tabled(rename = "Voucher")]
    voucher_id: String,
    #[tabled(rename = "Site")]
    site_id: String,
    #[tabled(rename = "Seller")]
    seller_id: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Sold At")]
    sold_at: String,
}

impl From<&Sale> for SaleRow {
    fn from(s: &Sale) -> Self {
        Self {
            voucher_id: s.voucher_id.clone(),
            site_id: s.site_id.clone(),
            seller_id: s.seller_id.clone().unwrap_or_else(|| "-".into()),
            amount: format!("{} {}", s.amount, s.currency),
            source: s.source.to_string(),
            sold_at: s.sold_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

pub async fn handle<S: VoucherStore>(
    store: &S,
    args: SalesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        SalesCommand::List { source } => {
            let sales = store
                .list_sales_by_source(source.map(SaleSource::from))
                .await?;
            let out = output::render_list(
                global.output,
                &sales,
                |s| SaleRow::from(s),
                |s| s.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

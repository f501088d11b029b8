// ── SQLite store ──
//
// sqlx-backed implementation used by the binary. Migrations are embedded
// at compile time. `sales.voucher_id` carries a UNIQUE index, and a
// violation on insert comes back as `StoreError::DuplicateSale`.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use tracing::{debug, info};
use url::Url;
use vouchly_api::OmadaCredentials;

use super::VoucherStore;
use crate::error::StoreError;
use crate::model::{
    LocalVoucherStatus, NewSale, NewVoucher, Sale, SaleSource, Site, SiteStatus, Voucher,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        info!(path = %path.display(), "opening voucher database");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// A private in-memory database. Single connection, kept open for the
    /// life of the pool, so every query sees the same data.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        MIGRATOR.run(&pool).await?;
        debug!("migrations applied");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ── Row mapping ──────────────────────────────────────────────────────

fn parse_text<T: FromStr>(row: &SqliteRow, column: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e| StoreError::Database(format!("bad value in column {column}: {raw:?} ({e})")))
}

fn site_from_row(row: &SqliteRow) -> Result<Site, StoreError> {
    Ok(Site {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        omada_site_id: row.try_get("omada_site_id")?,
        status: parse_text::<SiteStatus>(row, "status")?,
        created_at: row.try_get("created_at")?,
    })
}

fn voucher_from_row(row: &SqliteRow) -> Result<Voucher, StoreError> {
    Ok(Voucher {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        plan_id: row.try_get("plan_id")?,
        site_id: row.try_get("site_id")?,
        seller_id: row.try_get("seller_id")?,
        omada_group_id: row.try_get("omada_group_id")?,
        omada_voucher_id: row.try_get("omada_voucher_id")?,
        unit_price: parse_text::<Decimal>(row, "unit_price")?,
        status: parse_text::<LocalVoucherStatus>(row, "status")?,
        used_at: row.try_get("used_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn sale_from_row(row: &SqliteRow) -> Result<Sale, StoreError> {
    Ok(Sale {
        id: row.try_get("id")?,
        voucher_id: row.try_get("voucher_id")?,
        seller_id: row.try_get("seller_id")?,
        site_id: row.try_get("site_id")?,
        amount: parse_text::<Decimal>(row, "amount")?,
        currency: row.try_get("currency")?,
        source: parse_text::<SaleSource>(row, "payment_method")?,
        sold_at: row.try_get("sold_at")?,
        note: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

const SALE_COLUMNS: &str = "id, voucher_id, seller_id, site_id, amount, currency, \
                            payment_method, sold_at, notes, created_at";

const VOUCHER_COLUMNS: &str = "id, code, plan_id, site_id, seller_id, omada_group_id, \
                               omada_voucher_id, unit_price, status, used_at, created_at";

// ── VoucherStore ─────────────────────────────────────────────────────

impl VoucherStore for SqliteStore {
    async fn get_all_sites(&self) -> Result<Vec<Site>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, omada_site_id, status, created_at FROM sites ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(site_from_row).collect()
    }

    async fn get_omada_credentials(&self) -> Result<Option<OmadaCredentials>, StoreError> {
        let row = sqlx::query(
            "SELECT base_url, omadac_id, client_id, client_secret \
             FROM omada_credentials WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let base_url: String = row.try_get("base_url")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            StoreError::Database(format!("stored controller URL {base_url:?} is invalid: {e}"))
        })?;
        let client_secret: String = row.try_get("client_secret")?;

        Ok(Some(OmadaCredentials {
            base_url,
            omadac_id: row.try_get("omadac_id")?,
            client_id: row.try_get("client_id")?,
            client_secret: SecretString::from(client_secret),
        }))
    }

    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, StoreError> {
        let sql = format!("SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = ?");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(voucher_from_row).transpose()
    }

    async fn update_voucher_status_by_id(
        &self,
        id: &str,
        status: LocalVoucherStatus,
        used_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE vouchers SET status = ?, used_at = COALESCE(?, used_at) WHERE id = ?",
        )
        .bind(status.as_ref())
        .bind(used_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Voucher", id));
        }
        Ok(())
    }

    async fn get_sale_by_voucher_id(&self, voucher_id: &str) -> Result<Option<Sale>, StoreError> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE voucher_id = ?");
        let row = sqlx::query(&sql)
            .bind(voucher_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(sale_from_row).transpose()
    }

    async fn create_sale(&self, sale: NewSale) -> Result<Sale, StoreError> {
        let sale = sale.into_sale();

        let inserted = sqlx::query(
            "INSERT INTO sales (id, voucher_id, seller_id, site_id, amount, currency, \
             payment_method, sold_at, notes, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&sale.id)
        .bind(&sale.voucher_id)
        .bind(&sale.seller_id)
        .bind(&sale.site_id)
        .bind(sale.amount.to_string())
        .bind(&sale.currency)
        .bind(sale.source.as_ref())
        .bind(sale.sold_at)
        .bind(&sale.note)
        .bind(sale.created_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(sale),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(StoreError::DuplicateSale {
                    voucher_id: sale.voucher_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn upsert_site(&self, site: Site) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sites (id, name, omada_site_id, status, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
               name = excluded.name, \
               omada_site_id = excluded.omada_site_id, \
               status = excluded.status",
        )
        .bind(&site.id)
        .bind(&site.name)
        .bind(&site.omada_site_id)
        .bind(site.status.as_ref())
        .bind(site.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_voucher(&self, voucher: NewVoucher) -> Result<Voucher, StoreError> {
        let voucher = voucher.into_voucher();

        sqlx::query(
            "INSERT INTO vouchers (id, code, plan_id, site_id, seller_id, omada_group_id, \
             omada_voucher_id, unit_price, status, used_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&voucher.id)
        .bind(&voucher.code)
        .bind(&voucher.plan_id)
        .bind(&voucher.site_id)
        .bind(&voucher.seller_id)
        .bind(&voucher.omada_group_id)
        .bind(&voucher.omada_voucher_id)
        .bind(voucher.unit_price.to_string())
        .bind(voucher.status.as_ref())
        .bind(voucher.used_at)
        .bind(voucher.created_at)
        .execute(&self.pool)
        .await?;

        Ok(voucher)
    }

    async fn set_omada_credentials(&self, credentials: OmadaCredentials) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO omada_credentials \
               (id, base_url, omadac_id, client_id, client_secret, updated_at) \
             VALUES (1, ?, ?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET \
               base_url = excluded.base_url, \
               omadac_id = excluded.omadac_id, \
               client_id = excluded.client_id, \
               client_secret = excluded.client_secret, \
               updated_at = excluded.updated_at",
        )
        .bind(credentials.base_url.as_str())
        .bind(&credentials.omadac_id)
        .bind(&credentials.client_id)
        .bind(credentials.client_secret.expose_secret())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_sales_by_source(
        &self,
        source: Option<SaleSource>,
    ) -> Result<Vec<Sale>, StoreError> {
        let rows = match source {
            Some(source) => {
                let sql = format!(
                    "SELECT {SALE_COLUMNS} FROM sales WHERE payment_method = ? ORDER BY sold_at, id"
                );
                sqlx::query(&sql)
                    .bind(source.as_ref())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY sold_at, id");
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(sale_from_row).collect()
    }
}

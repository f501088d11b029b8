#![allow(clippy::unwrap_used)]
// Integration tests for `SyncService` against a wiremock Omada controller
// and an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vouchly_core::{
    CoreError, LocalVoucherStatus, MemoryStore, NewVoucher, OmadaCredentials, SaleSource, Site,
    SiteStatus, SyncConfig, SyncService, VoucherStore,
};

const OMADAC_ID: &str = "c0ffee";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Arc<MemoryStore>, SyncService<MemoryStore>) {
    setup_with(SyncConfig::default()).await
}

async fn setup_with(
    config: SyncConfig,
) -> (MockServer, Arc<MemoryStore>, SyncService<MemoryStore>) {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store
        .set_omada_credentials(credentials(&server))
        .await
        .unwrap();

    let service = SyncService::with_http_client(Arc::clone(&store), config, reqwest::Client::new());
    (server, store, service)
}

fn credentials(server: &MockServer) -> OmadaCredentials {
    OmadaCredentials {
        base_url: Url::parse(&server.uri()).unwrap(),
        omadac_id: OMADAC_ID.into(),
        client_id: "client-id".into(),
        client_secret: SecretString::from("client-secret".to_owned()),
    }
}

fn ok(result: &serde_json::Value) -> serde_json::Value {
    json!({ "errorCode": 0, "msg": "Success.", "result": result })
}

fn groups_path(omada_site: &str) -> String {
    format!("/openapi/v1/{OMADAC_ID}/sites/{omada_site}/hotspot/voucher-groups")
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/openapi/authorize/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
            "accessToken": "tok-1",
            "tokenType": "bearer",
            "expiresIn": 7200
        }))))
        .mount(server)
        .await;
}

/// One voucher group `g1` priced 10.00 BRL, listed on a single page.
async fn mount_group(server: &MockServer, omada_site: &str) {
    Mock::given(method("GET"))
        .and(path(groups_path(omada_site)))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
            "totalRows": 1,
            "currentPage": 1,
            "currentSize": 100,
            "data": [{
                "id": "g1",
                "name": "Daily",
                "unitPrice": "10.00",
                "currency": "BRL",
                "unusedCount": 0,
                "usedCount": 0,
                "inUseCount": 1,
                "expiredCount": 0,
                "totalCount": 1
            }]
        }))))
        .mount(server)
        .await;
}

/// Vouchers of group `g1` as `(code, status)` pairs.
async fn mount_vouchers(server: &MockServer, omada_site: &str, vouchers: &[(&str, u8)]) {
    let data: Vec<_> = vouchers
        .iter()
        .enumerate()
        .map(|(i, (code, status))| json!({ "id": format!("v{i}"), "code": code, "status": status }))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("{}/g1", groups_path(omada_site))))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
            "id": "g1",
            "name": "Daily",
            "unitPrice": "10.00",
            "currency": "BRL",
            "totalRows": data.len(),
            "currentPage": 1,
            "currentSize": 1000,
            "data": data
        }))))
        .mount(server)
        .await;
}

/// Voucher-group listings received for `omada_site`, one per site pass.
async fn group_listings(server: &MockServer, omada_site: &str) -> usize {
    let listing = groups_path(omada_site);
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == listing)
        .count()
}

async fn add_site(store: &MemoryStore, id: &str, omada_site: &str) -> Site {
    let site = Site::new(id, format!("Site {id}"), Some(omada_site.into()));
    store.upsert_site(site.clone()).await.unwrap();
    site
}

async fn add_voucher(store: &MemoryStore, code: &str, site_id: &str) -> String {
    store
        .insert_voucher(
            NewVoucher::new(code, site_id, Decimal::new(500, 2)).with_seller("seller-1"),
        )
        .await
        .unwrap()
        .id
}

// ── Reconciliation through a full sweep ─────────────────────────────

#[tokio::test]
async fn test_in_use_voucher_is_synced_with_one_sale() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("AB12CD", 1)]).await;

    add_site(&store, "s1", "omada-1").await;
    let voucher_id = add_voucher(&store, "AB12CD", "s1").await;

    let report = service.sync_all_sites().await.unwrap();
    let site = report.site("s1").unwrap();
    assert_eq!(site.vouchers_updated, 1);
    assert_eq!(site.sales_created, 1);
    assert!(site.is_clean());

    let voucher = store.voucher(&voucher_id).unwrap();
    assert_eq!(voucher.status, LocalVoucherStatus::InUse);
    assert!(voucher.used_at.is_some());

    let sales = store.list_sales_by_source(Some(SaleSource::OmadaSync)).await.unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].voucher_id, voucher_id);
    assert_eq!(sales[0].amount.to_string(), "10.00");
    assert_eq!(sales[0].currency, "BRL");
    assert_eq!(sales[0].seller_id.as_deref(), Some("seller-1"));

    // Same remote data again: nothing changes.
    let report = service.sync_all_sites().await.unwrap();
    assert_eq!(report.vouchers_updated(), 0);
    assert_eq!(report.sales_created(), 0);
    assert_eq!(store.sale_count(), 1);
    assert_eq!(
        store.voucher(&voucher_id).unwrap().status,
        LocalVoucherStatus::InUse
    );
}

#[tokio::test]
async fn test_repeated_sweeps_create_exactly_one_sale() {
    let cases = [
        (1, LocalVoucherStatus::InUse),
        (2, LocalVoucherStatus::Expired),
    ];
    for (remote_status, expected) in cases {
        for passes in 1..=5 {
            let (server, store, service) = setup().await;
            mount_token(&server).await;
            mount_group(&server, "omada-1").await;
            mount_vouchers(&server, "omada-1", &[("AB12CD", remote_status)]).await;

            add_site(&store, "s1", "omada-1").await;
            let voucher_id = add_voucher(&store, "AB12CD", "s1").await;

            for _ in 0..passes {
                service.sync_all_sites().await.unwrap();
            }

            assert_eq!(store.sale_count(), 1, "status={remote_status} passes={passes}");
            assert_eq!(store.voucher(&voucher_id).unwrap().status, expected);
        }
    }
}

#[tokio::test]
async fn test_consumed_vouchers_are_never_reverted() {
    for local in [LocalVoucherStatus::InUse, LocalVoucherStatus::Expired] {
        for passes in 1..=5 {
            let (server, store, service) = setup().await;
            mount_token(&server).await;
            mount_group(&server, "omada-1").await;
            mount_vouchers(&server, "omada-1", &[("AB12CD", 0)]).await;

            add_site(&store, "s1", "omada-1").await;
            let voucher_id = add_voucher(&store, "AB12CD", "s1").await;
            store
                .update_voucher_status_by_id(&voucher_id, local, None)
                .await
                .unwrap();

            let mut regressions = 0;
            for _ in 0..passes {
                let report = service.sync_all_sites().await.unwrap();
                regressions += report.site("s1").unwrap().regressions;
            }

            assert_eq!(store.voucher(&voucher_id).unwrap().status, local);
            assert_eq!(regressions, passes);
            assert_eq!(store.sale_count(), 0);
        }
    }
}

#[tokio::test]
async fn test_in_use_then_expired_keeps_first_sale() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("AB12CD", 1)]).await;

    add_site(&store, "s1", "omada-1").await;
    let voucher_id = add_voucher(&store, "AB12CD", "s1").await;

    service.sync_all_sites().await.unwrap();
    let first_sale = store.get_sale_by_voucher_id(&voucher_id).await.unwrap().unwrap();

    server.reset().await;
    mount_token(&server).await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("AB12CD", 2)]).await;

    let report = service.sync_all_sites().await.unwrap();
    assert_eq!(report.vouchers_updated(), 1);
    assert_eq!(report.sales_created(), 0);

    assert_eq!(
        store.voucher(&voucher_id).unwrap().status,
        LocalVoucherStatus::Expired
    );
    assert_eq!(store.sale_count(), 1);
    assert_eq!(
        store.get_sale_by_voucher_id(&voucher_id).await.unwrap().unwrap(),
        first_sale
    );
}

#[tokio::test]
async fn test_unmatched_code_is_counted_not_fatal() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("ZZ99ZZ", 1), ("AB12CD", 1)]).await;

    add_site(&store, "s1", "omada-1").await;
    add_voucher(&store, "AB12CD", "s1").await;

    let report = service.sync_all_sites().await.unwrap();
    let site = report.site("s1").unwrap();

    assert_eq!(site.vouchers_seen, 2);
    assert_eq!(site.unmatched, 1);
    assert_eq!(site.vouchers_updated, 1);
    assert_eq!(site.sales_created, 1);
    assert!(site.error.is_none());
}

// ── Failure isolation ───────────────────────────────────────────────

#[tokio::test]
async fn test_failing_site_does_not_abort_sweep() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;

    for (site_id, omada_site, code) in [("s1", "omada-1", "AAA111"), ("s3", "omada-3", "CCC333")] {
        mount_group(&server, omada_site).await;
        mount_vouchers(&server, omada_site, &[(code, 1)]).await;
        add_site(&store, site_id, omada_site).await;
        add_voucher(&store, code, site_id).await;
        if site_id == "s1" {
            add_site(&store, "s2", "omada-2").await;
        }
    }

    Mock::given(method("GET"))
        .and(path(groups_path("omada-2")))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let report = service.sync_all_sites().await.unwrap();

    let ids: Vec<_> = report.sites.iter().map(|s| s.site_id.as_str()).collect();
    assert_eq!(ids, ["s1", "s2", "s3"]);
    assert_eq!(report.site("s1").unwrap().sales_created, 1);
    assert_eq!(report.site("s3").unwrap().sales_created, 1);

    let failed = report.site("s2").unwrap();
    assert!(failed.partial);
    assert!(failed.error.is_some());
    assert_eq!(report.failed_sites(), 1);

    assert!(service.get_status().last_sync_time.is_some());
}

#[tokio::test]
async fn test_rejected_token_is_renewed_and_site_retried() {
    let (server, store, service) = setup().await;

    Mock::given(method("POST"))
        .and(path("/openapi/authorize/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
            "accessToken": "tok-1",
            "expiresIn": 7200
        }))))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(groups_path("omada-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorCode": -44112,
            "msg": "The access token has expired."
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("AB12CD", 1)]).await;

    add_site(&store, "s1", "omada-1").await;
    add_voucher(&store, "AB12CD", "s1").await;

    let report = service.sync_all_sites().await.unwrap();
    let site = report.site("s1").unwrap();
    assert!(site.is_clean(), "site report: {site:?}");
    assert_eq!(site.sales_created, 1);
}

#[tokio::test]
async fn test_token_rejected_mid_site_is_renewed_for_remaining_groups() {
    let (server, store, service) = setup().await;

    for token in ["tok-1", "tok-2"] {
        Mock::given(method("POST"))
            .and(path("/openapi/authorize/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
                "accessToken": token,
                "expiresIn": 7200
            }))))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
    }

    let group = |id: &str| {
        json!({ "id": id, "name": id, "unitPrice": "10.00", "currency": "BRL" })
    };
    Mock::given(method("GET"))
        .and(path(groups_path("omada-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
            "totalRows": 2,
            "currentPage": 1,
            "currentSize": 100,
            "data": [group("g1"), group("g2")]
        }))))
        .mount(&server)
        .await;

    for (group_id, code) in [("g1", "AAA111"), ("g2", "BBB222")] {
        let detail_path = format!("{}/{group_id}", groups_path("omada-1"));

        // g1 sees the stale token once; g2 must only ever see the new one.
        Mock::given(method("GET"))
            .and(path(detail_path.clone()))
            .and(header("Authorization", "AccessToken=tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorCode": -44112,
                "msg": "The access token has expired."
            })))
            .expect(u64::from(group_id == "g1"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(detail_path))
            .and(header("Authorization", "AccessToken=tok-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
                "id": group_id,
                "unitPrice": "10.00",
                "currency": "BRL",
                "totalRows": 1,
                "currentPage": 1,
                "currentSize": 1000,
                "data": [{ "id": format!("v-{group_id}"), "code": code, "status": 1 }]
            }))))
            .expect(1)
            .mount(&server)
            .await;
    }

    add_site(&store, "s1", "omada-1").await;
    add_voucher(&store, "AAA111", "s1").await;
    add_voucher(&store, "BBB222", "s1").await;

    let report = service.sync_all_sites().await.unwrap();
    let site = report.site("s1").unwrap();
    assert!(site.is_clean(), "site report: {site:?}");
    assert_eq!(site.groups, 2);
    assert_eq!(site.sales_created, 2);
    assert_eq!(store.sale_count(), 2);
}

#[tokio::test]
async fn test_token_is_shared_across_sites() {
    let (server, store, service) = setup().await;

    Mock::given(method("POST"))
        .and(path("/openapi/authorize/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(&json!({
            "accessToken": "tok-1",
            "expiresIn": 7200
        }))))
        .expect(1)
        .mount(&server)
        .await;

    for (site_id, omada_site) in [("s1", "omada-1"), ("s2", "omada-2"), ("s3", "omada-3")] {
        mount_group(&server, omada_site).await;
        mount_vouchers(&server, omada_site, &[]).await;
        add_site(&store, site_id, omada_site).await;
    }

    let report = service.sync_all_sites().await.unwrap();
    assert_eq!(report.sites.len(), 3);
    assert_eq!(report.failed_sites(), 0);
}

#[tokio::test]
async fn test_bad_client_secret_fails_each_site() {
    let (server, store, service) = setup().await;

    Mock::given(method("POST"))
        .and(path("/openapi/authorize/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errorCode": -44106,
            "msg": "The client id or client secret is invalid."
        })))
        .mount(&server)
        .await;

    add_site(&store, "s1", "omada-1").await;
    add_site(&store, "s2", "omada-2").await;

    let report = service.sync_all_sites().await.unwrap();
    assert_eq!(report.failed_sites(), 2);
    assert!(
        report.sites[0]
            .error
            .as_deref()
            .unwrap()
            .contains("client secret is invalid")
    );
    assert!(service.get_status().last_sync_time.is_some());
}

#[tokio::test]
async fn test_inactive_and_unmapped_sites_are_skipped() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let mut inactive = Site::new("s1", "Closed", Some("omada-1".into()));
    inactive.status = SiteStatus::Inactive;
    store.upsert_site(inactive).await.unwrap();
    store.upsert_site(Site::new("s2", "Unmapped", None)).await.unwrap();

    let report = service.sync_all_sites().await.unwrap();
    assert!(report.sites.is_empty());
}

// ── Forced sync ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_force_site_sync_runs_one_site() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("AB12CD", 2)]).await;

    add_site(&store, "s1", "omada-1").await;
    let voucher_id = add_voucher(&store, "AB12CD", "s1").await;

    let report = service.force_site_sync("s1").await.unwrap();
    assert_eq!(report.site_id, "s1");
    assert_eq!(report.sales_created, 1);
    assert_eq!(
        store.voucher(&voucher_id).unwrap().status,
        LocalVoucherStatus::Expired
    );
}

#[tokio::test]
async fn test_force_site_sync_rejects_unknown_and_inactive_sites() {
    let (_server, store, service) = setup().await;

    let mut inactive = Site::new("s1", "Closed", Some("omada-1".into()));
    inactive.status = SiteStatus::Inactive;
    store.upsert_site(inactive).await.unwrap();

    let result = service.force_site_sync("nope").await;
    assert!(
        matches!(result, Err(CoreError::SiteNotFound { ref site_id }) if site_id == "nope"),
        "got: {result:?}"
    );

    let result = service.force_site_sync("s1").await;
    assert!(
        matches!(result, Err(CoreError::SiteNotSyncable { .. })),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn test_force_site_sync_without_credentials() {
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::with_http_client(
        Arc::clone(&store),
        SyncConfig::default(),
        reqwest::Client::new(),
    );
    add_site(&store, "s1", "omada-1").await;

    let result = service.force_site_sync("s1").await;
    assert!(matches!(result, Err(CoreError::NoCredentials)), "got: {result:?}");
}

#[tokio::test]
async fn test_sync_voucher_group_reconciles_one_group() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;
    let remote = [("AB12CD", 1), ("EF34GH", 0), ("ZZ99ZZ", 2)];
    mount_vouchers(&server, "omada-1", &remote).await;

    let site = add_site(&store, "s1", "omada-1").await;
    let used = add_voucher(&store, "AB12CD", "s1").await;
    let unused = add_voucher(&store, "EF34GH", "s1").await;

    let group: vouchly_api::VoucherGroup = serde_json::from_value(json!({
        "id": "g1",
        "name": "Daily",
        "unitPrice": "10.00",
        "currency": "BRL"
    }))
    .unwrap();

    let report = service.sync_voucher_group(&site, &group).await.unwrap();
    assert_eq!(report.group_id, "g1");
    assert_eq!(report.vouchers_seen, 3);
    assert_eq!(report.vouchers_updated, 1);
    assert_eq!(report.sales_created, 1);
    assert_eq!(report.unmatched, 1);
    assert!(!report.partial);

    assert_eq!(store.voucher(&used).unwrap().status, LocalVoucherStatus::InUse);
    assert_eq!(
        store.voucher(&unused).unwrap().status,
        LocalVoucherStatus::Available
    );
    let sale = store.get_sale_by_voucher_id(&used).await.unwrap().unwrap();
    assert_eq!(sale.amount, Decimal::new(1000, 2));
    assert_eq!(sale.source, SaleSource::OmadaSync);
}

// ── Auto-sync lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn test_auto_sync_start_and_stop() {
    let (server, store, service) = setup().await;
    mount_token(&server).await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("AB12CD", 1)]).await;
    add_site(&store, "s1", "omada-1").await;
    add_voucher(&store, "AB12CD", "s1").await;

    let status = service.get_status();
    assert!(!status.is_running);
    assert!(status.last_sync_time.is_none());
    assert_eq!(status.sync_interval, Duration::from_secs(300));

    assert!(service.start_auto_sync().await);
    assert!(!service.start_auto_sync().await, "second start is a no-op");
    assert!(service.get_status().is_running);

    // The first sweep runs immediately.
    for _ in 0..100 {
        if service.get_status().last_sync_time.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(service.get_status().last_sync_time.is_some());
    assert_eq!(store.sale_count(), 1);

    assert!(service.stop_auto_sync().await);
    assert!(!service.get_status().is_running);
    assert!(!service.stop_auto_sync().await, "second stop is a no-op");

    // Restartable after a stop.
    assert!(service.start_auto_sync().await);
    assert!(service.stop_auto_sync().await);
}

#[tokio::test]
async fn test_auto_sync_ticks_until_stopped() {
    let (server, store, service) = setup_with(SyncConfig {
        interval: Duration::from_secs(1),
        ..SyncConfig::default()
    })
    .await;
    mount_token(&server).await;
    mount_group(&server, "omada-1").await;
    mount_vouchers(&server, "omada-1", &[("AB12CD", 1)]).await;
    add_site(&store, "s1", "omada-1").await;
    add_voucher(&store, "AB12CD", "s1").await;

    assert!(service.start_auto_sync().await);

    let mut sweeps = 0;
    for _ in 0..100 {
        sweeps = group_listings(&server, "omada-1").await;
        if sweeps >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(sweeps >= 3, "only {sweeps} sweep(s) ran");

    assert!(service.stop_auto_sync().await);
    let after_stop = group_listings(&server, "omada-1").await;

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(group_listings(&server, "omada-1").await, after_stop);
    assert_eq!(store.sale_count(), 1);
}

#[tokio::test]
async fn test_overrunning_sweeps_keep_the_timer_going() {
    let (server, store, service) = setup_with(SyncConfig {
        interval: Duration::from_secs(1),
        ..SyncConfig::default()
    })
    .await;
    mount_token(&server).await;

    // Every sweep outlasts the interval.
    Mock::given(method("GET"))
        .and(path(groups_path("omada-1")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(1200))
                .set_body_json(ok(&json!({
                    "totalRows": 0,
                    "currentPage": 1,
                    "currentSize": 100,
                    "data": []
                }))),
        )
        .mount(&server)
        .await;
    add_site(&store, "s1", "omada-1").await;

    assert!(service.start_auto_sync().await);

    let mut sweeps = 0;
    for _ in 0..120 {
        sweeps = group_listings(&server, "omada-1").await;
        if sweeps >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(sweeps >= 2, "only {sweeps} sweep(s) ran");
    assert!(service.get_status().last_sync_time.is_some());

    assert!(service.stop_auto_sync().await);
    let after_stop = group_listings(&server, "omada-1").await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(group_listings(&server, "omada-1").await, after_stop);
}

//! HTTP API tests
//!
//! Query, health and admin endpoints wired the way the server wires them,
//! backed by the fake database from `common`.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use serde_json::Value;

use common::{BROKEN_IP, StubSource, UNKNOWN_IP, fake_db_bytes, updater, write_provider_archive};
use ipgeo::api::ApiSettings;
use ipgeo::api::middleware::AdminAuth;
use ipgeo::api::services::{AppStartTime, admin_routes, health_routes, query_routes};
use ipgeo::config::DATABASE_FILENAME;
use ipgeo::database::DatabaseUpdater;

struct Fixture {
    _dir: tempfile::TempDir,
    updater: Arc<DatabaseUpdater>,
}

impl Fixture {
    /// `loaded` controls whether a database is in place before the first request
    fn new(loaded: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("remote.tar.gz");
        write_provider_archive(&archive, "Remoteville");
        let storage = dir.path().join("data");
        fs::create_dir_all(&storage).unwrap();
        if loaded {
            fs::write(storage.join(DATABASE_FILENAME), fake_db_bytes("Testville")).unwrap();
        }

        let updater = updater(&storage, false, StubSource::new(&archive, None));
        updater.bootstrap();
        assert_eq!(updater.swapper().is_loaded(), loaded);
        Self { _dir: dir, updater }
    }

    fn storage(&self) -> &Path {
        &self.updater.settings().storage_dir
    }
}

fn settings(admin_token: &str) -> ApiSettings {
    ApiSettings {
        locale: "zh-CN".to_string(),
        trusted_proxies: Vec::new(),
        admin_token: admin_token.to_string(),
    }
}

macro_rules! app {
    ($fixture:expr, $settings:expr) => {{
        let settings: ApiSettings = $settings;
        test::init_service(
            App::new()
                .app_data(web::Data::new($fixture.updater.swapper().clone()))
                .app_data(web::Data::new($fixture.updater.clone()))
                .app_data(web::Data::new(settings.clone()))
                .app_data(web::Data::new(AppStartTime {
                    start_datetime: chrono::Utc::now(),
                }))
                .service(
                    web::scope("/admin")
                        .wrap(AdminAuth::new(settings.admin_token.as_str()))
                        .service(admin_routes()),
                )
                .service(health_routes())
                .service(query_routes()),
        )
        .await
    }};
}

// =============================================================================
// Query
// =============================================================================

#[actix_rt::test]
async fn test_lookup_returns_pretty_record() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri("/8.8.8.8").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains("\n  \"city\""), "not pretty printed: {}", text);

    let json: Value = serde_json::from_str(text).unwrap();
    assert_eq!(json["ip"], "8.8.8.8");
    assert_eq!(json["city"]["city"], "Testville");
    assert_eq!(json["city"]["country"], "Testland (zh-CN)");
    assert_eq!(json["city"]["region"], "North");
    assert_eq!(json["city"]["continent"], "Testinent");
    assert_eq!(json["location"]["latitude"], 12.5);
    assert_eq!(json["location"]["longitude"], -45.25);
    assert_eq!(json["location"]["timezone"], "Etc/UTC");
    assert_eq!(json["location"]["accuracy"], 100);
    assert_eq!(json["location"]["metroCode"], 0);
}

#[actix_rt::test]
async fn test_ipv6_lookup() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri("/2001:4860:4860::8888").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_rt::test]
async fn test_local_addresses_skip_lookup() {
    // no database loaded: a lookup attempt would answer 503
    let fixture = Fixture::new(false);
    let app = app!(fixture, settings(""));

    for ip in [
        "127.0.0.1",
        "192.168.1.5",
        "10.1.2.3",
        "172.16.0.1",
        "::1",
        "fd00::1",
        "::ffff:127.0.0.1",
        "::ffff:192.168.1.5",
    ] {
        let req = TestRequest::get().uri(&format!("/{}", ip)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "ip {}", ip);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json, serde_json::json!({ "ip": ip }));
    }
}

#[actix_rt::test]
async fn test_no_database_is_503() {
    let fixture = Fixture::new(false);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri("/8.8.8.8").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["ip"], "8.8.8.8");
    assert_eq!(json["error"], "data unavailable");
}

#[actix_rt::test]
async fn test_invalid_ip_is_400() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri("/not-an-ip").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["ip"], "not-an-ip");
}

#[actix_rt::test]
async fn test_unknown_and_broken_lookups() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri(&format!("/{}", UNKNOWN_IP)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri(&format!("/{}", BROKEN_IP)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json, serde_json::json!({ "ip": BROKEN_IP }));
}

#[actix_rt::test]
async fn test_root_uses_forwarded_client_ip() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get()
        .uri("/")
        .insert_header(("X-Forwarded-For", "8.8.4.4, 10.0.0.1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["ip"], "8.8.4.4");

    let req = TestRequest::get()
        .uri("/")
        .insert_header(("X-Real-IP", "192.168.0.10"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_root_without_client_ip_is_404() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["ip"], "");
}

// =============================================================================
// Health
// =============================================================================

#[actix_rt::test]
async fn test_health_reports_database() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["database"]["generation"], 1);
    assert_eq!(json["data"]["database"]["provider"], "Fake");
    assert_eq!(json["data"]["updater"]["in_progress"], false);

    let req = TestRequest::get().uri("/health/ready").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = TestRequest::get().uri("/health/live").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );
}

#[actix_rt::test]
async fn test_health_without_database_is_503() {
    let fixture = Fixture::new(false);
    let app = app!(fixture, settings(""));

    let req = TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["data"]["database"]["status"], "unavailable");

    let req = TestRequest::get().uri("/health/ready").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

// =============================================================================
// Admin
// =============================================================================

#[actix_rt::test]
async fn test_admin_disabled_without_token() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings(""));

    let req = TestRequest::post()
        .uri("/admin/update")
        .insert_header(("Authorization", "Bearer anything"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_admin_rejects_bad_token() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings("s3cret"));

    for header in ["Bearer wrong", "s3cret", "Basic s3cret"] {
        let req = TestRequest::post()
            .uri("/admin/update")
            .insert_header(("Authorization", header))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "header {}", header);
    }

    let req = TestRequest::post().uri("/admin/update").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_admin_update_swaps_database() {
    let fixture = Fixture::new(true);
    let app = app!(fixture, settings("s3cret"));

    let req = TestRequest::post()
        .uri("/admin/update")
        .insert_header(("Authorization", "Bearer s3cret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["success"], true);
    assert_eq!(json["data"]["trigger"], "manual");
    assert_eq!(json["data"]["outcome"]["kind"], "updated");
    assert_eq!(json["data"]["outcome"]["generation"], 2);

    let req = TestRequest::get().uri("/8.8.8.8").to_request();
    let json: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(json["city"]["city"], "Remoteville");
    assert!(common::leftovers(fixture.storage()).is_empty());

    let req = TestRequest::get()
        .uri("/admin/update")
        .insert_header(("Authorization", "Bearer s3cret"))
        .to_request();
    let json: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(json["data"]["last_success"]["trigger"], "manual");
}

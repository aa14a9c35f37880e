//! Handler tests driven through the router with `oneshot`.

use affiliate_core::{
    config::LedgerConfig,
    onboarding::{create_customer, create_promoter, request_pins, NewCustomer, NewPromoter},
    store::LedgerStore,
};
use affiliate_server::{build_router, config::Config, state::AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;

fn seeded_store() -> LedgerStore {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let config = LedgerConfig::default_test();
    let promoter = create_promoter(
        &store,
        &config,
        NewPromoter {
            name: "Asha".into(),
            email: None,
            phone: None,
            parent_id: None,
        },
        Utc::now(),
    )
    .unwrap();
    create_customer(
        &store,
        &config,
        NewCustomer {
            public_id: "CUST-900".into(),
            name: "Ravi".into(),
            email: None,
            phone: None,
            promoter_id: promoter.profile_id.clone(),
        },
        Utc::now(),
    )
    .unwrap();
    request_pins(&store, &promoter.profile_id, 5, Utc::now()).unwrap();
    store
}

async fn get(store: LedgerStore, uri: &str) -> (StatusCode, Value) {
    let app = build_router(AppState::with_store(Config::default_test(), store)).unwrap();
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_environment() {
    let (status, body) = get(seeded_store(), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["environment"], "test");
    assert!(body["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn users_lists_every_profile() {
    let (status, body) = get(seeded_store(), "/api/users").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn promoters_and_customers_are_filtered_by_role() {
    let (_, promoters) = get(seeded_store(), "/api/promoters").await;
    let (_, customers) = get(seeded_store(), "/api/customers").await;

    assert_eq!(promoters["data"][0]["public_id"], "PROM0001");
    assert_eq!(promoters["data"][0]["wallet_balance"], 500.0);
    assert_eq!(promoters["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(customers["data"][0]["public_id"], "CUST-900");
    assert_eq!(customers["data"][0]["role"], "customer");
    assert_eq!(customers["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn pin_requests_are_listed() {
    let (status, body) = get(seeded_store(), "/api/pin-requests").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["pin_count"], 5);
    assert_eq!(body["data"][0]["status"], "pending");
}

#[tokio::test]
async fn store_failures_use_the_error_envelope() {
    let store = seeded_store();
    store.execute_admin_sql("DROP TABLE pin_request;").unwrap();

    let (status, body) = get(store, "/api/pin-requests").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("pin_request")));
}

#[tokio::test]
async fn cors_allows_only_the_configured_origin() {
    let app = build_router(AppState::with_store(Config::default_test(), seeded_store())).unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/users")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn unknown_paths_serve_the_frontend_index() {
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), "<html>SPA</html>").unwrap();
    let config = Config {
        static_dir: static_dir.path().to_string_lossy().into_owned(),
        ..Config::default_test()
    };
    let app = build_router(AppState::with_store(config, seeded_store())).unwrap();

    let response = app
        .oneshot(Request::builder().uri("/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<html>SPA</html>");
}

#[tokio::test]
async fn missing_frontend_build_is_a_404() {
    let (status, _) = get(seeded_store(), "/no/such/page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

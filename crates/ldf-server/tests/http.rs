//! Router-level tests driven through `tower::ServiceExt::oneshot`, the way
//! `shipper`'s own HTTP-facing tests exercise a service without binding a
//! real listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ldf_server::state::AppState;
use ldf_storage::LocalFsBackend;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../migrations/schema.sql");
const PEER: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST), 0);

async fn test_state() -> Arc<AppState> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    sqlx::query(SCHEMA).execute(&pool).await.expect("apply schema");

    let storage = Arc::new(LocalFsBackend::new(std::env::temp_dir().join("ldf-server-test")));
    Arc::new(AppState::new(pool, storage, [7u8; ldf_settings::KEY_LEN]))
}

/// Inserts a user row directly (bypassing the HTTP API, which has no
/// user-creation endpoint of its own) and returns its bearer token.
async fn seed_user(state: &AppState, role: &str) -> String {
    let id = Uuid::new_v4();
    let token = format!("test-token-{id}");
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, token, created_at)
         VALUES (?, ?, ?, 'x', ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(format!("user-{id}"))
    .bind(format!("{id}@example.test"))
    .bind(role)
    .bind(&token)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.pool)
    .await
    .expect("seed user");
    token
}

fn request(method: &str, uri: &str, token: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .extension(ConnectInfo(PEER));
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(body.into()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_ok_when_db_and_storage_are_reachable() {
    let state = test_state().await;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request("GET", "/healthz", None, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn creating_a_distribution_without_a_bearer_token_is_rejected() {
    let state = test_state().await;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/v1/distributions",
            None,
            r#"{"name":"test","version":"1.0"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn member_can_create_and_then_read_back_a_distribution() {
    let state = test_state().await;
    let token = seed_user(&state, "member").await;
    let app = ldf_server::build_router(state);

    let create_response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/distributions",
            Some(&token),
            r#"{"name":"bookworm","version":"12.1"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(create_response.status(), StatusCode::CREATED);
    let created = body_json(create_response).await;
    let id = created["id"].as_str().unwrap();

    let get_response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/v1/distributions/{id}"),
            Some(&token),
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
    let fetched = body_json(get_response).await;
    assert_eq!(fetched["name"], "bookworm");
    assert_eq!(fetched["status"], "pending");
}

#[tokio::test]
async fn viewer_cannot_create_a_distribution() {
    let state = test_state().await;
    let token = seed_user(&state, "viewer").await;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/v1/distributions",
            Some(&token),
            r#"{"name":"bookworm","version":"12.1"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn listing_distributions_with_no_rows_returns_an_empty_array() {
    let state = test_state().await;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request("GET", "/v1/distributions", None, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 0);
    assert!(body["distributions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn private_distribution_is_invisible_to_an_unauthenticated_reader() {
    let state = test_state().await;
    let token = seed_user(&state, "member").await;
    let app = ldf_server::build_router(state);

    let create_response = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/distributions",
            Some(&token),
            r#"{"name":"trixie","version":"13.0","visibility":"private"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(create_response.status(), StatusCode::CREATED);

    let list_response = app
        .oneshot(request("GET", "/v1/distributions", None, Body::empty()))
        .await
        .unwrap();
    let body = body_json(list_response).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn filter_preview_reports_exclude_reasons() {
    let state = test_state().await;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/v1/filters/preview",
            None,
            r#"{"filter":"6.*,!*-rc*","versions":["6.12.1","6.12.1-rc1","5.15"]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["included"], true);
    assert_eq!(results[1]["included"], false);
    assert_eq!(results[2]["included"], false);
}

#[tokio::test]
async fn unknown_setting_key_is_a_404_for_an_authenticated_caller() {
    let state = test_state().await;
    let token = seed_user(&state, "admin").await;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request(
            "GET",
            "/v1/settings/does.not.exist",
            Some(&token),
            Body::empty(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_admin_cannot_write_a_setting() {
    let state = test_state().await;
    let token = seed_user(&state, "member").await;
    let key = ldf_settings::STATIC_REGISTRY[0].key;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request(
            "PUT",
            &format!("/v1/settings/{key}"),
            Some(&token),
            r#"{"value":"1"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_reset_requires_the_exact_confirmation_phrase() {
    let state = test_state().await;
    let token = seed_user(&state, "root").await;
    let app = ldf_server::build_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/v1/admin/reset",
            Some(&token),
            r#"{"confirm":"please"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

//! Shared test helpers: in-memory database, seeded tenant, router setup.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use fieldcheck_api::{build_router, AppState};
use fieldcheck_common::config::Config;
use serde_json::Value;
use sqlx::SqlitePool;

pub const ORG_A: &str = "org-a";
pub const ORG_B: &str = "org-b";
pub const PROFILE_A: &str = "profile-a";
pub const PROFILE_B: &str = "profile-b";
pub const ASSET_A: &str = "torre-001";

/// In-memory database with two seeded organizations, one profile each, and
/// one asset in organization A.
pub async fn setup_test_db() -> SqlitePool {
    let pool = fieldcheck_common::db::init_memory_database()
        .await
        .expect("Should open in-memory database");

    for (org, profile) in [(ORG_A, PROFILE_A), (ORG_B, PROFILE_B)] {
        sqlx::query("INSERT INTO organizations (id, nombre) VALUES (?, ?)")
            .bind(org)
            .bind(format!("Organization {}", org))
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO profiles (id, organization_id, nombre, rol) VALUES (?, ?, 'Inspector', 'inspector')")
            .bind(profile)
            .bind(org)
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO assets (id, organization_id) VALUES (?, ?)")
        .bind(ASSET_A)
        .bind(ORG_A)
        .execute(&pool)
        .await
        .unwrap();

    pool
}

pub fn setup_app(db: SqlitePool, media_dir: &std::path::Path) -> axum::Router {
    let config = Config {
        media_dir: media_dir.to_path_buf(),
        ..Config::default()
    };
    build_router(AppState::new(db, config))
}

/// Request with the caller identity header set.
pub fn authed_request(method: &str, uri: &str, profile: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Profile-Id", profile);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Send one request against a fresh clone of the router and decode the
/// response.
pub async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    use tower::util::ServiceExt;
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = if status == StatusCode::NO_CONTENT {
        Value::Null
    } else {
        extract_json(response.into_body()).await
    };
    (status, body)
}

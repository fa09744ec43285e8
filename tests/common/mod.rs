#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use casebook::app::{db, tenant::ProjectAccess};
use casebook::create_router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::ServiceExt;

/// In-memory database with migrations applied. One connection, kept open, so every
/// query sees the same database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub fn test_router(pool: SqlitePool) -> axum::Router {
    test_router_with_access(pool, Arc::new(casebook::app::tenant::AllowAll))
}

pub fn test_router_with_access(pool: SqlitePool, access: Arc<dyn ProjectAccess>) -> axum::Router {
    let state = casebook::app::AppState {
        db: pool,
        config: casebook::app::config::Config::for_tests(),
        access,
    };
    create_router(state)
}

/// Only the named caller may access anything.
pub struct OnlyCaller(pub &'static str);

#[async_trait::async_trait]
impl ProjectAccess for OnlyCaller {
    async fn allows(
        &self,
        caller: Option<&str>,
        _project_id: &str,
        _access: casebook::app::tenant::Access,
    ) -> bool {
        caller == Some(self.0)
    }
}

/// Insert an empty project and return its id.
pub async fn create_project(pool: &SqlitePool, slug: &str) -> String {
    let id = ulid::Ulid::new().to_string();
    db::projects::insert(
        pool,
        &db::projects::NewProject {
            id: id.clone(),
            name: format!("Project {}", slug),
            slug: slug.to_string(),
            description: None,
        },
    )
    .await
    .unwrap();
    id
}

/// Tag `smoke`, root suite `A`, suite `B` under `A` holding test `TC-9` tagged `smoke`.
pub fn scenario_bundle() -> Value {
    json!({
        "version": "1.0",
        "exportedAt": "2025-01-01T00:00:00Z",
        "project": { "name": "Source", "slug": "source", "description": null },
        "suites": [
            { "id": "s-a", "parentId": null, "name": "A", "order": 0, "testIds": [] },
            { "id": "s-b", "parentId": "s-a", "name": "B", "order": 0, "testIds": ["t-9"] }
        ],
        "tests": [
            {
                "id": "t-9",
                "code": "TC-9",
                "title": "Login works",
                "content": {
                    "description": "Happy path",
                    "blocks": [
                        { "id": "b1", "type": "step", "content": "Open the login page" },
                        { "id": "b2", "type": "expected", "content": "Dashboard is shown", "metadata": { "severity": "high" } }
                    ]
                },
                "tags": ["smoke"]
            }
        ],
        "tags": [ { "id": "g-smoke", "name": "smoke", "color": "#ff0000" } ]
    })
}

/// Root suite `name` only.
pub fn single_suite_bundle(name: &str) -> Value {
    json!({
        "version": "1.0",
        "exportedAt": "2025-01-01T00:00:00Z",
        "project": { "name": "Source", "slug": "source", "description": null },
        "suites": [ { "id": "s-1", "parentId": null, "name": name, "order": 0, "testIds": [] } ],
        "tests": [],
        "tags": []
    })
}

pub fn import_body(bundle: Value, options: Value) -> Value {
    json!({ "data": bundle, "options": options })
}

pub fn all(policy: &str) -> Value {
    json!({ "tests": policy, "suites": policy, "tags": if policy == "create_new" { "skip" } else { policy } })
}

pub async fn post_json(app: &axum::Router, uri: &str, body: &Value) -> (http::StatusCode, Value) {
    let request = http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

pub async fn get_json(app: &axum::Router, uri: &str) -> (http::StatusCode, http::HeaderMap, Value) {
    let request = http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, value)
}

pub async fn import(app: &axum::Router, project_id: &str, bundle: Value, options: Value) -> (http::StatusCode, Value) {
    post_json(
        app,
        &format!("/api/projects/{}/import", project_id),
        &import_body(bundle, options),
    )
    .await
}

pub async fn export(app: &axum::Router, project_id: &str) -> Value {
    let (status, _, body) = get_json(app, &format!("/api/projects/{}/export", project_id)).await;
    assert_eq!(status, http::StatusCode::OK, "export failed: {}", body);
    body
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

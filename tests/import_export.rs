//! Tests for bundle export (GET), import and preview (POST) and import history.

use std::sync::Arc;

use serde_json::json;

mod common;

use crate::common::*;

mod export_tests {
    use super::*;

    #[tokio::test]
    async fn export_404_for_nonexistent_project() {
        let pool = test_pool().await;
        let app = test_router(pool);

        let (status, _, body) = get_json(&app, "/api/projects/01JPROJECT000000000000001/export").await;
        assert_eq!(status, http::StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn export_404_when_caller_lacks_access() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router_with_access(pool, Arc::new(OnlyCaller("owner")));

        let (status, _, body) = get_json(&app, &format!("/api/projects/{}/export", project_id)).await;
        assert_eq!(status, http::StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let request = http::Request::builder()
            .method("GET")
            .uri(format!("/api/projects/{}/export", project_id))
            .header("x-caller-id", "owner")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn export_succeeds_returns_json_with_attachment_header() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web-app").await;
        let app = test_router(pool);

        let (status, headers, body) = get_json(&app, &format!("/api/projects/{}/export", project_id)).await;
        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(
            headers.get("content-type").map(|v| v.to_str().unwrap()),
            Some("application/json")
        );
        let disposition = headers
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert!(disposition.starts_with("attachment; filename=\"web-app-"), "{}", disposition);
        assert!(disposition.ends_with(".json\""), "{}", disposition);

        assert_eq!(body["version"], "1.0");
        assert_eq!(body["project"]["slug"], "web-app");
        assert_eq!(body["suites"], json!([]));
        assert_eq!(body["tests"], json!([]));
        assert_eq!(body["tags"], json!([]));
        assert!(body["exportedAt"].as_str().is_some_and(|s| !s.is_empty()));
    }

    #[tokio::test]
    async fn export_reflects_imported_content() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool);

        let (status, _) = import(&app, &project_id, scenario_bundle(), json!({})).await;
        assert_eq!(status, http::StatusCode::OK);

        let body = export(&app, &project_id).await;
        let suites = body["suites"].as_array().unwrap();
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0]["name"], "A");
        assert_eq!(suites[0]["order"], 0);
        assert_eq!(suites[1]["order"], 1);

        let b = suites.iter().find(|s| s["name"] == "B").unwrap();
        let a = suites.iter().find(|s| s["name"] == "A").unwrap();
        assert_eq!(b["parentId"], a["id"]);

        let tests = body["tests"].as_array().unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0]["code"], "TC-9");
        assert_eq!(tests[0]["tags"], json!(["smoke"]));
        assert_eq!(tests[0]["content"], scenario_bundle()["tests"][0]["content"]);
        assert_eq!(b["testIds"], json!([tests[0]["id"]]));

        assert_eq!(body["tags"][0]["name"], "smoke");
        assert_eq!(body["tags"][0]["color"], "#ff0000");
    }
}

mod import_tests {
    use super::*;

    #[tokio::test]
    async fn import_404_for_nonexistent_project() {
        let pool = test_pool().await;
        let app = test_router(pool);

        let (status, body) = import(&app, "01JPROJECT000000000000001", scenario_bundle(), json!({})).await;
        assert_eq!(status, http::StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn import_wrong_version_returns_400() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool.clone());

        let mut bundle = scenario_bundle();
        bundle["version"] = json!("2.0");
        let (status, body) = import(&app, &project_id, bundle, json!({})).await;

        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "SCHEMA_VERSION_MISMATCH");
        assert_eq!(count(&pool, "suites").await, 0);
    }

    #[tokio::test]
    async fn import_cycle_returns_validation_error_and_writes_nothing() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool.clone());

        let mut bundle = scenario_bundle();
        bundle["suites"] = json!([
            { "id": "s-a", "parentId": "s-b", "name": "A", "order": 0, "testIds": [] },
            { "id": "s-b", "parentId": "s-a", "name": "B", "order": 0, "testIds": [] }
        ]);
        let (status, body) = import(&app, &project_id, bundle, json!({})).await;

        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        let details: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|d| d.as_str())
            .collect();
        assert!(details.contains(&"suite 'A' is part of a parent cycle"));
        assert!(details.contains(&"suite 'B' is part of a parent cycle"));

        assert_eq!(count(&pool, "suites").await, 0);
        assert_eq!(count(&pool, "tests").await, 0);
        assert_eq!(count(&pool, "tags").await, 0);
    }

    #[tokio::test]
    async fn import_reports_every_violation_at_once() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool);

        let mut bundle = scenario_bundle();
        bundle["tags"][0]["color"] = json!("red");
        bundle["tests"][0]["tags"] = json!(["smoke", "nightly"]);
        bundle["suites"][1]["testIds"] = json!(["t-9", "t-404"]);
        let (status, body) = import(&app, &project_id, bundle, json!({})).await;

        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert_eq!(
            body["details"],
            json!([
                "tag 'smoke': invalid color",
                "suite 'B' references unknown test 't-404'",
                "test 'TC-9' references unknown tag 'nightly'"
            ])
        );
    }

    #[tokio::test]
    async fn import_rejects_unknown_policy() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool);

        let options = json!({ "conflictResolution": { "tags": "create_new" } });
        let (status, _) = import(&app, &project_id, scenario_bundle(), options).await;
        assert!(status.is_client_error(), "unexpected {}", status);
    }

    #[tokio::test]
    async fn import_succeeds_returns_summary_and_mappings() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool);

        let (status, body) = import(&app, &project_id, scenario_bundle(), json!({ "mode": "merge" })).await;
        assert_eq!(status, http::StatusCode::OK, "{}", body);

        assert_eq!(body["tags"], json!({ "created": 1, "updated": 0, "skipped": 0 }));
        assert_eq!(body["suites"], json!({ "created": 2, "updated": 0, "skipped": 0 }));
        assert_eq!(body["tests"], json!({ "created": 1, "updated": 0, "skipped": 0 }));
        assert!(body["mappings"]["tests"]["t-9"].is_string());
        assert!(body["mappings"]["suites"]["s-a"].is_string());
        assert!(body["mappings"]["tags"]["g-smoke"].is_string());
    }

    #[tokio::test]
    async fn failed_import_returns_import_failed_and_writes_nothing() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool.clone());

        sqlx::query(
            "CREATE TRIGGER reject_suite BEFORE INSERT ON suites WHEN NEW.name = 'B' BEGIN SELECT RAISE(ABORT, 'suite rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let (status, body) = import(&app, &project_id, scenario_bundle(), json!({})).await;
        assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "IMPORT_FAILED");

        assert_eq!(count(&pool, "tags").await, 0);
        assert_eq!(count(&pool, "suites").await, 0);
        assert_eq!(count(&pool, "import_audit").await, 0);
    }

    #[tokio::test]
    async fn dry_run_returns_preview_and_writes_nothing() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool.clone());

        let (status, body) = import(&app, &project_id, scenario_bundle(), json!({ "dryRun": true })).await;
        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(body["suites"]["toCreate"], json!(["A", "A / B"]));
        assert_eq!(body["tests"]["toCreate"], json!(["TC-9"]));
        assert_eq!(body["tags"]["toCreate"], json!(["smoke"]));

        assert_eq!(count(&pool, "suites").await, 0);
        assert_eq!(count(&pool, "import_audit").await, 0);
    }

    #[tokio::test]
    async fn preview_forces_dry_run() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool.clone());

        import(&app, &project_id, scenario_bundle(), json!({})).await;

        let (status, body) = post_json(
            &app,
            &format!("/api/projects/{}/import/preview", project_id),
            &import_body(scenario_bundle(), json!({ "dryRun": false, "conflictResolution": all("overwrite") })),
        )
        .await;
        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(body["tests"]["toUpdate"], json!(["TC-9"]));
        assert_eq!(body["tests"]["conflicts"], json!(["TC-9"]));
        assert_eq!(body["suites"]["toUpdate"], json!(["A", "A / B"]));
        assert_eq!(body["tags"]["toUpdate"], json!(["smoke"]));

        assert_eq!(count(&pool, "test_versions").await, 1);
        assert_eq!(count(&pool, "import_audit").await, 1);
    }
}

mod history_tests {
    use super::*;

    #[tokio::test]
    async fn imports_are_listed_newest_first() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        let app = test_router(pool);

        import(&app, &project_id, scenario_bundle(), json!({})).await;
        import(&app, &project_id, scenario_bundle(), json!({ "mode": "replace" })).await;
        import(&app, &project_id, scenario_bundle(), json!({ "dryRun": true })).await;

        let (status, _, body) = get_json(&app, &format!("/api/projects/{}/imports", project_id)).await;
        assert_eq!(status, http::StatusCode::OK);

        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        let modes: Vec<&str> = entries.iter().filter_map(|e| e["mode"].as_str()).collect();
        assert!(modes.contains(&"merge") && modes.contains(&"replace"));
        for entry in entries {
            assert_eq!(entry["summary"]["tests"]["created"], 1);
        }
    }

    #[tokio::test]
    async fn unreadable_summary_is_listed_as_null() {
        let pool = test_pool().await;
        let project_id = create_project(&pool, "web").await;
        casebook::app::db::import_audit::insert(
            &pool,
            &casebook::app::db::import_audit::NewImportAudit {
                id: ulid::Ulid::new().to_string(),
                project_id: project_id.clone(),
                mode: "merge".to_string(),
                summary: "{not json".to_string(),
            },
        )
        .await
        .unwrap();
        let app = test_router(pool);

        let (status, _, body) = get_json(&app, &format!("/api/projects/{}/imports", project_id)).await;
        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(body[0]["mode"], "merge");
        assert!(body[0]["summary"].is_null());
    }

    #[tokio::test]
    async fn history_404_for_nonexistent_project() {
        let pool = test_pool().await;
        let app = test_router(pool);

        let (status, _, _) = get_json(&app, "/api/projects/01JPROJECT000000000000001/imports").await;
        assert_eq!(status, http::StatusCode::NOT_FOUND);
    }
}

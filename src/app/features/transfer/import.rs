//! POST /api/projects/:project_id/import and /import/preview — Reconcile a bundle into a project.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::json;
use ulid::Ulid;

use super::bundle::{Bundle, ImportRequest, BUNDLE_VERSION};
use super::execute::{run_import, ImportSummary};
use super::plan::{preview_import, ImportPreview};
use super::validate::validate_bundle;
use crate::app::{
    db,
    error::AppError,
    tenant::{self, Access},
    AppState,
};

/// Response of the import endpoint: a preview for dry runs, otherwise the applied summary.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ImportOutcome {
    Preview(ImportPreview),
    Applied(ImportSummary),
}

/// Version gate first, then the full structural report.
pub fn check_bundle(bundle: &Bundle) -> Result<(), AppError> {
    if bundle.version != BUNDLE_VERSION {
        return Err(AppError::SchemaVersionMismatch {
            expected: BUNDLE_VERSION.to_string(),
            found: bundle.version.clone(),
        });
    }
    let violations = validate_bundle(bundle);
    if !violations.is_empty() {
        return Err(AppError::Validation(violations));
    }
    Ok(())
}

/// POST /api/projects/:project_id/import — Apply a bundle, or preview it when `dryRun` is set.
pub async fn import_bundle(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ImportRequest>,
) -> Result<Json<ImportOutcome>, AppError> {
    let project = tenant::require_project_access(&state, &headers, &project_id, Access::Write).await?;
    check_bundle(&body.data)?;

    if body.options.dry_run {
        let mut conn = state.db.acquire().await?;
        let preview = preview_import(&mut conn, &project.id, &body.data, &body.options).await?;
        return Ok(Json(ImportOutcome::Preview(preview)));
    }

    let summary = run_import(
        &state.db,
        &project.id,
        &body.data,
        &body.options,
        state.config.import_timeout(),
    )
    .await
    .map_err(|e| AppError::ImportFailed(e.to_string()))?;

    tracing::info!(
        project_id = %project.id,
        mode = %body.options.mode,
        tags_created = summary.tags.created,
        suites_created = summary.suites.created,
        tests_created = summary.tests.created,
        tests_updated = summary.tests.updated,
        "Bundle imported"
    );

    let entry = db::import_audit::NewImportAudit {
        id: Ulid::new().to_string(),
        project_id: project.id.clone(),
        mode: body.options.mode.to_string(),
        summary: json!({
            "tags": summary.tags,
            "suites": summary.suites,
            "tests": summary.tests,
        })
        .to_string(),
    };
    if let Err(err) = db::import_audit::insert(&state.db, &entry).await {
        tracing::warn!(%err, project_id = %project.id, "Failed to record import audit");
    }

    Ok(Json(ImportOutcome::Applied(summary)))
}

/// POST /api/projects/:project_id/import/preview — Classify a bundle without writing anything.
pub async fn preview_bundle(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ImportRequest>,
) -> Result<Json<ImportPreview>, AppError> {
    let project = tenant::require_project_access(&state, &headers, &project_id, Access::Read).await?;
    check_bundle(&body.data)?;

    let mut options = body.options;
    options.dry_run = true;

    let mut conn = state.db.acquire().await?;
    let preview = preview_import(&mut conn, &project.id, &body.data, &options).await?;
    Ok(Json(preview))
}

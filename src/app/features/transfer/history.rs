//! GET /api/projects/:project_id/imports — Past imports, newest first.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::app::{
    db,
    error::AppError,
    tenant::{self, Access},
    AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryEntry {
    pub id: String,
    pub mode: String,
    /// Per-type created/updated/skipped counts as recorded at import time.
    pub summary: Value,
    pub created_at: i64,
}

pub async fn list_imports(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ImportHistoryEntry>>, AppError> {
    let project = tenant::require_project_access(&state, &headers, &project_id, Access::Read).await?;

    let entries = db::import_audit::find_by_project(&state.db, &project.id)
        .await?
        .into_iter()
        .map(|row| {
            let summary = serde_json::from_str(&row.summary).unwrap_or_else(|err| {
                tracing::warn!(%err, import_id = %row.id, "Unreadable import summary");
                Value::Null
            });
            ImportHistoryEntry {
                summary,
                id: row.id,
                mode: row.mode,
                created_at: row.created_at,
            }
        })
        .collect();

    Ok(Json(entries))
}

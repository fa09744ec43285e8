//! Bundle export and import reconciliation.

pub mod bundle;
pub mod execute;
pub mod export;
pub mod history;
pub mod import;
pub mod plan;
pub mod validate;

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:project_id/export", get(export::export_project))
        .route("/api/projects/:project_id/import", post(import::import_bundle))
        .route("/api/projects/:project_id/import/preview", post(import::preview_bundle))
        .route("/api/projects/:project_id/imports", get(history::list_imports))
}

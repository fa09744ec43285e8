use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;

/// Shared state available to all handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: config::Config,
    pub access: Arc<dyn tenant::ProjectAccess>,
}

/// App routes. Merged into the top-level router in lib.rs.
pub fn routes() -> Router<AppState> {
    Router::new().merge(features::transfer::routes())
}

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod features;
pub mod tenant;

//! Project access enforcement.
//!
//! **Rule**: every transfer endpoint resolves its project through [`require_project_access`].

use axum::http::HeaderMap;
use strum_macros::Display;

use crate::app::{db, error::AppError, AppState};

/// Header carrying the caller's identity, if the deployment provides one.
pub const CALLER_HEADER: &str = "x-caller-id";

/// Kind of access an endpoint needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Access {
    /// Export, preview, import history.
    Read,
    /// Import.
    Write,
}

/// Decides whether a caller may touch a project. Swappable per deployment.
#[async_trait::async_trait]
pub trait ProjectAccess: Send + Sync {
    async fn allows(&self, caller: Option<&str>, project_id: &str, access: Access) -> bool;
}

/// Grants everything. Default for single-tenant deployments and tests.
pub struct AllowAll;

#[async_trait::async_trait]
impl ProjectAccess for AllowAll {
    async fn allows(&self, _caller: Option<&str>, _project_id: &str, _access: Access) -> bool {
        true
    }
}

/// Caller id from the request headers. Empty or non-UTF-8 values count as absent.
pub fn caller_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Loads the project if the caller may access it.
///
/// Returns `NotFound` both when the project is missing and when access is denied,
/// so callers cannot probe for project existence.
pub async fn require_project_access(
    state: &AppState,
    headers: &HeaderMap,
    project_id: &str,
    access: Access,
) -> Result<db::projects::Project, AppError> {
    let caller = caller_id(headers);
    if !state.access.allows(caller, project_id, access).await {
        tracing::debug!(project_id, caller = ?caller, %access, "Project access denied");
        return Err(AppError::NotFound);
    }

    db::projects::find_by_id(&state.db, project_id)
        .await?
        .ok_or(AppError::NotFound)
}

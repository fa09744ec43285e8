//! GET /api/projects/:project_id/export — Download the project as a bundle.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, State},
    http::{
        header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;
use thiserror::Error;
use time::OffsetDateTime;

use super::bundle::{Bundle, BundleProject, BundleSuite, BundleTag, BundleTest, BUNDLE_VERSION};
use crate::app::{
    db,
    domain::TestContent,
    error::AppError,
    tenant::{self, Access},
    AppState,
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored content of test '{code}' is unreadable: {source}")]
    Content {
        code: String,
        source: serde_json::Error,
    },
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Database(e) => AppError::Database(e),
            ExportError::Content { code, source } => {
                tracing::error!(%code, %source, "unreadable test content");
                AppError::Internal
            }
        }
    }
}

/// Snapshot the project as a bundle. Output is deterministic apart from `exported_at`:
/// suites by order key (renumbered from 0), tests by code, tags by name.
/// Tests without any version are left out.
pub async fn build_bundle(
    pool: &SqlitePool,
    project: &db::projects::Project,
) -> Result<Bundle, ExportError> {
    // One read transaction, so suite links and tests come from the same snapshot.
    let mut tx = pool.begin().await?;
    let suites = db::suites::find_by_project(&mut *tx, &project.id).await?;
    let items = db::suite_items::find_by_project(&mut *tx, &project.id).await?;
    let tests = db::test_cases::find_by_project(&mut *tx, &project.id).await?;
    let versions = db::test_versions::find_latest_by_project(&mut *tx, &project.id).await?;
    let test_tags = db::test_tags::find_names_by_project(&mut *tx, &project.id).await?;
    let tags = db::tags::find_by_project(&mut *tx, &project.id).await?;
    tx.commit().await?;

    let latest: HashMap<String, db::test_versions::TestVersion> =
        versions.into_iter().map(|v| (v.test_id.clone(), v)).collect();

    let mut tag_names: HashMap<String, Vec<String>> = HashMap::new();
    for link in test_tags {
        tag_names.entry(link.test_id).or_default().push(link.tag_name);
    }

    let mut bundle_tests = Vec::with_capacity(latest.len());
    for test in tests {
        let Some(version) = latest.get(&test.id) else {
            continue;
        };
        let content: TestContent =
            serde_json::from_str(&version.content).map_err(|source| ExportError::Content {
                code: test.code.clone(),
                source,
            })?;
        bundle_tests.push(BundleTest {
            tags: tag_names.remove(&test.id).unwrap_or_default(),
            id: test.id,
            code: test.code,
            title: version.title.clone(),
            content,
        });
    }

    let exported: HashSet<&str> = bundle_tests.iter().map(|t| t.id.as_str()).collect();
    let mut linked: HashMap<&str, Vec<String>> = HashMap::new();
    for item in &items {
        if exported.contains(item.test_id.as_str()) {
            linked
                .entry(item.suite_id.as_str())
                .or_default()
                .push(item.test_id.clone());
        }
    }

    let bundle_suites: Vec<BundleSuite> = suites
        .iter()
        .enumerate()
        .map(|(i, s)| BundleSuite {
            id: s.id.clone(),
            parent_id: s.parent_id.clone(),
            name: s.name.clone(),
            order: i as i64,
            test_ids: linked.remove(s.id.as_str()).unwrap_or_default(),
        })
        .collect();

    let exported_at = OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();

    Ok(Bundle {
        version: BUNDLE_VERSION.to_string(),
        exported_at,
        project: BundleProject {
            name: project.name.clone(),
            slug: project.slug.clone(),
            description: project.description.clone(),
        },
        suites: bundle_suites,
        tests: bundle_tests,
        tags: tags
            .into_iter()
            .map(|t| BundleTag {
                id: t.id,
                name: t.name,
                color: t.color,
            })
            .collect(),
    })
}

/// Keep alphanumerics, `-` and `_`; everything else becomes `-`.
fn sanitize_filename_slug(slug: &str) -> String {
    let s: String = slug
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .take(80)
        .collect();
    s.trim_matches('-').to_string()
}

/// `<slug>-<YYYY-MM-DD>.json`
pub fn export_filename(slug: &str, at: OffsetDateTime) -> String {
    let slug = sanitize_filename_slug(slug);
    let slug = if slug.is_empty() { "project".to_string() } else { slug };
    let date = at.date();
    format!(
        "{}-{:04}-{:02}-{:02}.json",
        slug,
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// GET /api/projects/:project_id/export — Export project as JSON attachment.
pub async fn export_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let project = tenant::require_project_access(&state, &headers, &project_id, Access::Read).await?;

    let bundle = build_bundle(&state.db, &project).await?;
    tracing::info!(
        project_id = %project.id,
        suites = bundle.suites.len(),
        tests = bundle.tests.len(),
        tags = bundle.tags.len(),
        "Project exported"
    );

    let body = serde_json::to_vec(&bundle).map_err(|_| AppError::Internal)?;

    let disposition = format!(
        r#"attachment; filename="{}""#,
        export_filename(&project.slug, OffsetDateTime::now_utc())
    );
    let disposition_value = HeaderValue::try_from(disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=project.json"));

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response_headers.insert(CONTENT_DISPOSITION, disposition_value);

    Ok((StatusCode::OK, response_headers, body).into_response())
}

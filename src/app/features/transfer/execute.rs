//! Import executor: applies an [`ImportPlan`] inside one transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use ulid::Ulid;

use super::bundle::{Bundle, ImportOptions};
use super::plan::{
    Bucket, ExistingState, ImportPlan, ParentRef, PlannedSuite, SuiteAction, SuiteTarget, TagAction,
    TestAction,
};
use crate::app::db;
use crate::app::domain::order_key::{append_keys, AppendKeys, OrderKeyError};
use crate::app::domain::test_code::{code_number, format_test_code};
use crate::app::domain::{ImportMode, TestContent};

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("order key error: {0}")]
    OrderKey(#[from] OrderKeyError),
    #[error("content encoding error: {0}")]
    Content(#[from] serde_json::Error),
    #[error("suite '{0}' could not be resolved")]
    UnresolvedSuite(String),
    #[error("suite '{0}' already exists")]
    SuiteExists(String),
    #[error("import did not finish within {0:?}")]
    Timeout(Duration),
}

/// Per-type outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
}

impl EntityCounts {
    fn record(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Create => self.created += 1,
            Bucket::Update => self.updated += 1,
            Bucket::Skip => self.skipped += 1,
        }
    }
}

/// Bundle-local id to persisted id, per type.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityMappings {
    pub tags: BTreeMap<String, String>,
    pub suites: BTreeMap<String, String>,
    pub tests: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub tags: EntityCounts,
    pub suites: EntityCounts,
    pub tests: EntityCounts,
    pub mappings: EntityMappings,
}

/// Apply `bundle` to the project in a single transaction bounded by `timeout`.
/// Nothing is written unless every step succeeds.
pub async fn run_import(
    pool: &SqlitePool,
    project_id: &str,
    bundle: &Bundle,
    options: &ImportOptions,
    timeout: Duration,
) -> Result<ImportSummary, ExecuteError> {
    let work = async {
        let mut tx = pool.begin().await?;
        let summary = apply(&mut tx, project_id, bundle, options).await?;
        tx.commit().await?;
        Ok::<_, ExecuteError>(summary)
    };

    match tokio::time::timeout(timeout, work).await {
        Ok(result) => result,
        // Dropping the transaction rolls it back.
        Err(_) => Err(ExecuteError::Timeout(timeout)),
    }
}

async fn apply(
    conn: &mut SqliteConnection,
    project_id: &str,
    bundle: &Bundle,
    options: &ImportOptions,
) -> Result<ImportSummary, ExecuteError> {
    if options.mode == ImportMode::Replace {
        clear_project(conn, project_id).await?;
    }

    let existing = ExistingState::load(conn, project_id).await?;
    let plan = ImportPlan::build(bundle, &options.conflict_resolution, &existing);

    let mut summary = ImportSummary::default();
    let tag_ids = apply_tags(conn, project_id, &plan, &mut summary).await?;
    apply_suites(conn, project_id, &plan, &mut summary).await?;
    apply_tests(conn, project_id, &plan, &tag_ids, &mut summary).await?;
    relink_suite_items(conn, bundle, &summary.mappings).await?;

    Ok(summary)
}

async fn clear_project(conn: &mut SqliteConnection, project_id: &str) -> Result<(), sqlx::Error> {
    let items = db::suite_items::delete_by_project(&mut *conn, project_id).await?;
    let links = db::test_tags::delete_by_project(&mut *conn, project_id).await?;
    let versions = db::test_versions::delete_by_project(&mut *conn, project_id).await?;
    let tests = db::test_cases::delete_by_project(&mut *conn, project_id).await?;
    let suites = db::suites::delete_by_project(&mut *conn, project_id).await?;
    let tags = db::tags::delete_by_project(&mut *conn, project_id).await?;
    tracing::debug!(
        project_id,
        items,
        links,
        versions,
        tests,
        suites,
        tags,
        "Cleared project for replace import"
    );
    Ok(())
}

/// Returns tag name -> persisted id for every bundle tag.
async fn apply_tags(
    conn: &mut SqliteConnection,
    project_id: &str,
    plan: &ImportPlan<'_>,
    summary: &mut ImportSummary,
) -> Result<HashMap<String, String>, ExecuteError> {
    let mut by_name = HashMap::new();
    for planned in &plan.tags {
        let tag = planned.tag;
        let id = match &planned.action {
            TagAction::Create => {
                let id = Ulid::new().to_string();
                let new_tag = db::tags::NewTag {
                    id: id.clone(),
                    project_id: project_id.to_string(),
                    name: tag.name.clone(),
                    color: tag.color.clone(),
                };
                db::tags::insert(&mut *conn, &new_tag).await?;
                id
            }
            TagAction::Overwrite { id } => {
                db::tags::update_color(&mut *conn, id, &tag.color).await?;
                id.clone()
            }
            TagAction::Skip { id } => id.clone(),
        };
        tracing::debug!(tag = %tag.name, action = ?planned.action, "Tag applied");
        summary.tags.record(planned.action.bucket());
        summary.mappings.tags.insert(tag.id.clone(), id.clone());
        by_name.insert(tag.name.clone(), id);
    }
    Ok(by_name)
}

async fn apply_suites(
    conn: &mut SqliteConnection,
    project_id: &str,
    plan: &ImportPlan<'_>,
    summary: &mut ImportSummary,
) -> Result<(), ExecuteError> {
    let keys = assign_suite_keys(conn, project_id, &plan.suites).await?;

    for planned in &plan.suites {
        let suite = planned.suite;
        let id = match &planned.action {
            SuiteAction::Create { name } => {
                let parent_id = match &planned.parent {
                    ParentRef::Root => None,
                    ParentRef::Existing(id) => Some(id.clone()),
                    ParentRef::Planned(bundle_id) => Some(resolve(&summary.mappings, bundle_id)?),
                };
                if db::suites::name_taken(&mut *conn, project_id, parent_id.as_deref(), name).await? {
                    return Err(ExecuteError::SuiteExists(planned.path.clone()));
                }
                let order_key = keys
                    .get(suite.id.as_str())
                    .cloned()
                    .ok_or_else(|| ExecuteError::UnresolvedSuite(suite.id.clone()))?;
                let id = Ulid::new().to_string();
                let new_suite = db::suites::NewSuite {
                    id: id.clone(),
                    project_id: project_id.to_string(),
                    parent_id,
                    name: name.clone(),
                    order_key,
                };
                db::suites::insert(&mut *conn, &new_suite).await?;
                id
            }
            SuiteAction::Overwrite { target } | SuiteAction::Skip { target } => match target {
                SuiteTarget::Existing(id) => id.clone(),
                SuiteTarget::Planned(bundle_id) => resolve(&summary.mappings, bundle_id)?,
            },
        };
        tracing::debug!(suite = %planned.path, action = ?planned.action, "Suite applied");
        summary.suites.record(planned.action.bucket());
        summary.mappings.suites.insert(suite.id.clone(), id);
    }
    Ok(())
}

fn resolve(mappings: &EntityMappings, bundle_id: &str) -> Result<String, ExecuteError> {
    mappings
        .suites
        .get(bundle_id)
        .cloned()
        .ok_or_else(|| ExecuteError::UnresolvedSuite(bundle_id.to_string()))
}

/// Order keys for every suite the plan creates, keyed by bundle suite id. New siblings are
/// appended after the existing ones in plan order; an oversized tail re-seeds existing
/// siblings in place.
async fn assign_suite_keys<'a>(
    conn: &mut SqliteConnection,
    project_id: &str,
    suites: &[PlannedSuite<'a>],
) -> Result<HashMap<&'a str, String>, ExecuteError> {
    let mut groups: Vec<(&ParentRef, Vec<&'a str>)> = Vec::new();
    for planned in suites {
        if !matches!(planned.action, SuiteAction::Create { .. }) {
            continue;
        }
        match groups.iter_mut().find(|g| g.0 == &planned.parent) {
            Some(group) => group.1.push(planned.suite.id.as_str()),
            None => groups.push((&planned.parent, vec![planned.suite.id.as_str()])),
        }
    }

    let mut keys = HashMap::new();
    for (parent, members) in groups {
        let siblings = match parent {
            ParentRef::Root => db::suites::find_sibling_keys(&mut *conn, project_id, None).await?,
            ParentRef::Existing(id) => {
                db::suites::find_sibling_keys(&mut *conn, project_id, Some(id.as_str())).await?
            }
            // Created by this import, so it has no children yet.
            ParentRef::Planned(_) => Vec::new(),
        };
        let last = siblings.last().map(|s| s.order_key.as_str());
        let new_keys = match append_keys(last, siblings.len(), members.len())? {
            AppendKeys::Appended(new_keys) => new_keys,
            AppendKeys::Reseeded(mut all) => {
                let new_keys = all.split_off(siblings.len());
                for (sibling, key) in siblings.iter().zip(&all) {
                    db::suites::update_order_key(&mut *conn, &sibling.id, key).await?;
                }
                tracing::debug!(siblings = siblings.len(), "Re-seeded suite order keys");
                new_keys
            }
        };
        keys.extend(members.into_iter().zip(new_keys));
    }
    Ok(keys)
}

async fn apply_tests(
    conn: &mut SqliteConnection,
    project_id: &str,
    plan: &ImportPlan<'_>,
    tag_ids: &HashMap<String, String>,
    summary: &mut ImportSummary,
) -> Result<(), ExecuteError> {
    // Codes the bundle inserts verbatim; allocated codes must not collide with them.
    let reserved: HashSet<&str> = plan
        .tests
        .iter()
        .filter(|p| p.action == TestAction::Create)
        .map(|p| p.test.code.as_str())
        .collect();

    for planned in &plan.tests {
        let test = planned.test;
        let resolved_tags: Vec<&str> = test
            .tags
            .iter()
            .filter_map(|name| tag_ids.get(name).map(String::as_str))
            .collect();

        let id = match &planned.action {
            TestAction::Create => {
                if let Some(n) = code_number(&test.code) {
                    db::projects::raise_test_counter(&mut *conn, project_id, n).await?;
                }
                create_test(conn, project_id, &test.code, &test.title, &test.content).await?
            }
            TestAction::CreateWithNewCode => {
                let code = allocate_code(conn, project_id, &reserved).await?;
                tracing::debug!(from = %test.code, to = %code, "Allocated new test code");
                create_test(conn, project_id, &code, &test.title, &test.content).await?
            }
            TestAction::Overwrite { id } => {
                overwrite_test(conn, id, &test.title, &test.content).await?;
                db::test_tags::delete_for_test(&mut *conn, id).await?;
                id.clone()
            }
            TestAction::Skip { id } => id.clone(),
        };

        if !matches!(planned.action, TestAction::Skip { .. }) {
            for tag_id in resolved_tags {
                db::test_tags::insert_if_not_exists(&mut *conn, &id, tag_id).await?;
            }
        }

        tracing::debug!(code = %test.code, action = ?planned.action, "Test applied");
        summary.tests.record(planned.action.bucket());
        summary.mappings.tests.insert(test.id.clone(), id);
    }
    Ok(())
}

async fn allocate_code(
    conn: &mut SqliteConnection,
    project_id: &str,
    reserved: &HashSet<&str>,
) -> Result<String, sqlx::Error> {
    loop {
        let n = db::projects::next_test_number(&mut *conn, project_id).await?;
        let code = format_test_code(n);
        if reserved.contains(code.as_str()) {
            continue;
        }
        if !db::test_cases::code_taken(&mut *conn, project_id, &code).await? {
            return Ok(code);
        }
    }
}

async fn create_test(
    conn: &mut SqliteConnection,
    project_id: &str,
    code: &str,
    title: &str,
    content: &TestContent,
) -> Result<String, ExecuteError> {
    let id = Ulid::new().to_string();
    let new_test = db::test_cases::NewTestCase {
        id: id.clone(),
        project_id: project_id.to_string(),
        code: code.to_string(),
        title: title.to_string(),
    };
    db::test_cases::insert(&mut *conn, &new_test).await?;
    insert_version(conn, &id, 1, title, content).await?;
    Ok(id)
}

/// Adds a version only when the title or content fingerprint changed.
async fn overwrite_test(
    conn: &mut SqliteConnection,
    test_id: &str,
    title: &str,
    content: &TestContent,
) -> Result<(), ExecuteError> {
    let latest = db::test_versions::find_latest(&mut *conn, test_id).await?;
    let fingerprint = content.fingerprint()?;
    let next = match &latest {
        Some(v) if v.title == title && v.fingerprint == fingerprint => return Ok(()),
        Some(v) => v.version + 1,
        None => 1,
    };
    insert_version(conn, test_id, next, title, content).await?;
    db::test_cases::update_title(&mut *conn, test_id, title).await?;
    Ok(())
}

async fn insert_version(
    conn: &mut SqliteConnection,
    test_id: &str,
    version: i64,
    title: &str,
    content: &TestContent,
) -> Result<(), ExecuteError> {
    let new_version = db::test_versions::NewTestVersion {
        id: Ulid::new().to_string(),
        test_id: test_id.to_string(),
        version,
        title: title.to_string(),
        content: serde_json::to_string(content)?,
        fingerprint: content.fingerprint()?,
    };
    db::test_versions::insert(&mut *conn, &new_version).await?;
    Ok(())
}

/// Appends each bundle suite's tests after the suite's current items, skipping tests
/// already linked.
async fn relink_suite_items(
    conn: &mut SqliteConnection,
    bundle: &Bundle,
    mappings: &EntityMappings,
) -> Result<(), ExecuteError> {
    for suite in &bundle.suites {
        let suite_id = resolve(mappings, &suite.id)?;
        let items = db::suite_items::find_by_suite(&mut *conn, &suite_id).await?;

        let mut linked: HashSet<String> = items.iter().map(|i| i.test_id.clone()).collect();
        let mut to_link = Vec::new();
        for bundle_test_id in &suite.test_ids {
            if let Some(test_id) = mappings.tests.get(bundle_test_id) {
                if linked.insert(test_id.clone()) {
                    to_link.push(test_id.clone());
                }
            }
        }
        if to_link.is_empty() {
            continue;
        }

        let last = items.last().map(|i| i.order_key.as_str());
        let new_keys = match append_keys(last, items.len(), to_link.len())? {
            AppendKeys::Appended(new_keys) => new_keys,
            AppendKeys::Reseeded(mut all) => {
                let new_keys = all.split_off(items.len());
                for (item, key) in items.iter().zip(&all) {
                    db::suite_items::update_order_key(&mut *conn, &item.suite_id, &item.test_id, key)
                        .await?;
                }
                tracing::debug!(suite_id = %suite_id, items = items.len(), "Re-seeded suite item keys");
                new_keys
            }
        };

        for (test_id, order_key) in to_link.into_iter().zip(new_keys) {
            let item = db::suite_items::NewSuiteItem {
                suite_id: suite_id.clone(),
                test_id,
                order_key,
            };
            db::suite_items::insert(&mut *conn, &item).await?;
        }
    }
    Ok(())
}

//! Conflict planner: classifies every bundle entity against current project state.
//!
//! Both the preview endpoint and the import executor build an [`ImportPlan`] with
//! this module, so a dry run and a real run cannot classify anything differently.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::SqliteConnection;

use super::bundle::{Bundle, BundleSuite, BundleTag, BundleTest, ConflictResolution, ImportOptions};
use crate::app::{
    db,
    domain::{EntityResolution, ImportMode, TagResolution},
};

/// Where a suite hangs. Root suites have no parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
    Root,
    /// A suite that exists in the project.
    Existing(String),
    /// A suite created earlier in this import, by bundle id.
    Planned(String),
}

/// Suite an imported suite is matched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuiteTarget {
    Existing(String),
    Planned(String),
}

impl SuiteTarget {
    fn as_parent(&self) -> ParentRef {
        match self {
            SuiteTarget::Existing(id) => ParentRef::Existing(id.clone()),
            SuiteTarget::Planned(bundle_id) => ParentRef::Planned(bundle_id.clone()),
        }
    }
}

/// Preview bucket an action falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Create,
    Update,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    Create,
    Overwrite { id: String },
    Skip { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestAction {
    /// Insert with the bundle's code.
    Create,
    /// Code is taken; insert under a freshly allocated code.
    CreateWithNewCode,
    Overwrite { id: String },
    Skip { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuiteAction {
    /// Insert under the planned parent with `name` (already disambiguated for create_new).
    Create { name: String },
    Overwrite { target: SuiteTarget },
    Skip { target: SuiteTarget },
}

impl TagAction {
    pub fn bucket(&self) -> Bucket {
        match self {
            TagAction::Create => Bucket::Create,
            TagAction::Overwrite { .. } => Bucket::Update,
            TagAction::Skip { .. } => Bucket::Skip,
        }
    }
}

impl TestAction {
    pub fn bucket(&self) -> Bucket {
        match self {
            TestAction::Create | TestAction::CreateWithNewCode => Bucket::Create,
            TestAction::Overwrite { .. } => Bucket::Update,
            TestAction::Skip { .. } => Bucket::Skip,
        }
    }
}

impl SuiteAction {
    pub fn bucket(&self) -> Bucket {
        match self {
            SuiteAction::Create { .. } => Bucket::Create,
            SuiteAction::Overwrite { .. } => Bucket::Update,
            SuiteAction::Skip { .. } => Bucket::Skip,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedTag<'a> {
    pub tag: &'a BundleTag,
    pub conflict: bool,
    pub action: TagAction,
}

#[derive(Debug, Clone)]
pub struct PlannedTest<'a> {
    pub test: &'a BundleTest,
    pub conflict: bool,
    pub action: TestAction,
}

#[derive(Debug, Clone)]
pub struct PlannedSuite<'a> {
    pub suite: &'a BundleSuite,
    /// Bundle name path, e.g. `Auth / Login`.
    pub path: String,
    pub parent: ParentRef,
    pub conflict: bool,
    pub action: SuiteAction,
}

/// Natural keys of the current project, keyed for lookup.
#[derive(Debug, Clone, Default)]
pub struct ExistingState {
    tags: HashMap<String, String>,
    tests: HashMap<String, String>,
    suites: HashMap<(Option<String>, String), String>,
}

impl ExistingState {
    /// Load tag names, test codes and (parent, name) suite keys for a project.
    pub async fn load(conn: &mut SqliteConnection, project_id: &str) -> Result<Self, sqlx::Error> {
        let tags = db::tags::find_by_project(&mut *conn, project_id).await?;
        let tests = db::test_cases::find_by_project(&mut *conn, project_id).await?;
        let suites = db::suites::find_by_project(&mut *conn, project_id).await?;
        Ok(Self::from_rows(&tags, &tests, &suites))
    }

    pub fn from_rows(
        tags: &[db::tags::Tag],
        tests: &[db::test_cases::TestCase],
        suites: &[db::suites::Suite],
    ) -> Self {
        let mut state = Self::default();
        for t in tags {
            state.tags.entry(t.name.clone()).or_insert_with(|| t.id.clone());
        }
        for t in tests {
            state.tests.entry(t.code.clone()).or_insert_with(|| t.id.clone());
        }
        // Rows arrive in order-key order; the first sibling with a name wins.
        for s in suites {
            state
                .suites
                .entry((s.parent_id.clone(), s.name.clone()))
                .or_insert_with(|| s.id.clone());
        }
        state
    }
}

/// Full classification of a bundle. Tags and tests keep bundle order;
/// suites are in parent-before-child order.
#[derive(Debug, Clone)]
pub struct ImportPlan<'a> {
    pub tags: Vec<PlannedTag<'a>>,
    pub suites: Vec<PlannedSuite<'a>>,
    pub tests: Vec<PlannedTest<'a>>,
}

impl<'a> ImportPlan<'a> {
    pub fn build(bundle: &'a Bundle, policy: &ConflictResolution, existing: &ExistingState) -> Self {
        Self {
            tags: plan_tags(&bundle.tags, policy.tags, existing),
            suites: plan_suites(&bundle.suites, policy.suites, existing),
            tests: plan_tests(&bundle.tests, policy.tests, existing),
        }
    }

    pub fn preview(&self) -> ImportPreview {
        let mut preview = ImportPreview::default();
        for p in &self.tags {
            preview.tags.add(&p.tag.name, p.conflict, p.action.bucket());
        }
        for p in &self.suites {
            preview.suites.add(&p.path, p.conflict, p.action.bucket());
        }
        for p in &self.tests {
            preview.tests.add(&p.test.code, p.conflict, p.action.bucket());
        }
        preview
    }
}

/// Natural keys per bucket for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPreview {
    pub to_create: Vec<String>,
    pub to_update: Vec<String>,
    pub to_skip: Vec<String>,
    pub conflicts: Vec<String>,
}

impl EntityPreview {
    fn add(&mut self, key: &str, conflict: bool, bucket: Bucket) {
        let list = match bucket {
            Bucket::Create => &mut self.to_create,
            Bucket::Update => &mut self.to_update,
            Bucket::Skip => &mut self.to_skip,
        };
        list.push(key.to_string());
        if conflict {
            self.conflicts.push(key.to_string());
        }
    }
}

/// What an import would do, per entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub tags: EntityPreview,
    pub suites: EntityPreview,
    pub tests: EntityPreview,
}

fn plan_tags<'a>(
    tags: &'a [BundleTag],
    policy: TagResolution,
    existing: &ExistingState,
) -> Vec<PlannedTag<'a>> {
    tags.iter()
        .map(|tag| match existing.tags.get(&tag.name) {
            None => PlannedTag {
                tag,
                conflict: false,
                action: TagAction::Create,
            },
            Some(id) => PlannedTag {
                tag,
                conflict: true,
                action: match policy {
                    TagResolution::Skip => TagAction::Skip { id: id.clone() },
                    TagResolution::Overwrite => TagAction::Overwrite { id: id.clone() },
                },
            },
        })
        .collect()
}

fn plan_tests<'a>(
    tests: &'a [BundleTest],
    policy: EntityResolution,
    existing: &ExistingState,
) -> Vec<PlannedTest<'a>> {
    tests
        .iter()
        .map(|test| match existing.tests.get(&test.code) {
            None => PlannedTest {
                test,
                conflict: false,
                action: TestAction::Create,
            },
            Some(id) => PlannedTest {
                test,
                conflict: true,
                action: match policy {
                    EntityResolution::Skip => TestAction::Skip { id: id.clone() },
                    EntityResolution::Overwrite => TestAction::Overwrite { id: id.clone() },
                    EntityResolution::CreateNew => TestAction::CreateWithNewCode,
                },
            },
        })
        .collect()
}

fn plan_suites<'a>(
    suites: &'a [BundleSuite],
    policy: EntityResolution,
    existing: &ExistingState,
) -> Vec<PlannedSuite<'a>> {
    // (parent, name) -> suite, including suites this plan creates.
    let mut taken: HashMap<(ParentRef, String), SuiteTarget> = existing
        .suites
        .iter()
        .map(|((parent, name), id)| {
            let parent = match parent {
                None => ParentRef::Root,
                Some(pid) => ParentRef::Existing(pid.clone()),
            };
            ((parent, name.clone()), SuiteTarget::Existing(id.clone()))
        })
        .collect();
    // Bundle suite id -> where its children hang.
    let mut resolved: HashMap<&str, ParentRef> = HashMap::new();
    let mut paths: HashMap<&str, String> = HashMap::new();
    let mut planned = Vec::with_capacity(suites.len());

    for idx in visit_order(suites) {
        let suite = &suites[idx];
        let parent = match suite.parent_id.as_deref() {
            None => ParentRef::Root,
            Some(pid) => resolved
                .get(pid)
                .cloned()
                .unwrap_or_else(|| ParentRef::Planned(pid.to_string())),
        };
        let path = match suite.parent_id.as_deref().and_then(|pid| paths.get(pid)) {
            Some(parent_path) => format!("{} / {}", parent_path, suite.name),
            None => suite.name.clone(),
        };

        let key = (parent.clone(), suite.name.clone());
        let (conflict, action) = match taken.get(&key).cloned() {
            None => {
                taken.insert(key, SuiteTarget::Planned(suite.id.clone()));
                (
                    false,
                    SuiteAction::Create {
                        name: suite.name.clone(),
                    },
                )
            }
            Some(target) => match policy {
                EntityResolution::Skip => (true, SuiteAction::Skip { target }),
                EntityResolution::Overwrite => (true, SuiteAction::Overwrite { target }),
                EntityResolution::CreateNew => {
                    let name = (1..)
                        .map(|attempt| imported_name(&suite.name, attempt))
                        .find(|candidate| !taken.contains_key(&(parent.clone(), candidate.clone())))
                        .unwrap_or_else(|| suite.name.clone());
                    taken.insert((parent.clone(), name.clone()), SuiteTarget::Planned(suite.id.clone()));
                    (true, SuiteAction::Create { name })
                }
            },
        };

        let children_parent = match &action {
            SuiteAction::Create { .. } => ParentRef::Planned(suite.id.clone()),
            SuiteAction::Overwrite { target } | SuiteAction::Skip { target } => target.as_parent(),
        };
        resolved.insert(suite.id.as_str(), children_parent);
        paths.insert(suite.id.as_str(), path.clone());

        planned.push(PlannedSuite {
            suite,
            path,
            parent,
            conflict,
            action,
        });
    }

    planned
}

/// Name used for the `attempt`-th create_new copy: `X (imported)`, `X (imported 2)`, ...
pub fn imported_name(base: &str, attempt: u32) -> String {
    if attempt <= 1 {
        format!("{} (imported)", base)
    } else {
        format!("{} (imported {})", base, attempt)
    }
}

/// Indices of `suites` with every parent before its children and siblings in declared
/// `order` (bundle position breaks ties). Suites with an unknown parent are treated as
/// roots. Suites on a parent cycle are never reached; the validator rejects those first.
pub fn visit_order(suites: &[BundleSuite]) -> Vec<usize> {
    let ids: HashSet<&str> = suites.iter().map(|s| s.id.as_str()).collect();
    let mut children: HashMap<Option<&str>, Vec<usize>> = HashMap::new();
    for (i, s) in suites.iter().enumerate() {
        let parent = s.parent_id.as_deref().filter(|p| ids.contains(p));
        children.entry(parent).or_default().push(i);
    }
    for list in children.values_mut() {
        list.sort_by_key(|&i| (suites[i].order, i));
    }

    let mut order = Vec::with_capacity(suites.len());
    let mut visited: HashSet<usize> = HashSet::new();
    let mut stack: Vec<usize> = children.get(&None).map(|r| r.iter().rev().copied().collect()).unwrap_or_default();
    while let Some(i) = stack.pop() {
        if !visited.insert(i) {
            continue;
        }
        order.push(i);
        if let Some(kids) = children.get(&Some(suites[i].id.as_str())) {
            stack.extend(kids.iter().rev().copied());
        }
    }
    order
}

/// Dry run: classify against the project as it is now (or as empty, for replace mode)
/// on a plain read connection. Never writes.
pub async fn preview_import(
    conn: &mut SqliteConnection,
    project_id: &str,
    bundle: &Bundle,
    options: &ImportOptions,
) -> Result<ImportPreview, sqlx::Error> {
    let existing = match options.mode {
        ImportMode::Replace => ExistingState::default(),
        ImportMode::Merge => ExistingState::load(conn, project_id).await?,
    };
    let plan = ImportPlan::build(bundle, &options.conflict_resolution, &existing);
    Ok(plan.preview())
}

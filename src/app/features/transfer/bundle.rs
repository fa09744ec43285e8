//! Bundle wire format shared by export and import. One schema for both directions.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::app::domain::{EntityResolution, ImportMode, TagResolution, TestContent};

/// The only bundle version this engine reads or writes. No negotiation.
pub const BUNDLE_VERSION: &str = "1.0";

/// Top-level bundle payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub version: String,
    #[serde(default)]
    pub exported_at: String,
    pub project: BundleProject,
    #[serde(default)]
    pub suites: Vec<BundleSuite>,
    #[serde(default)]
    pub tests: Vec<BundleTest>,
    #[serde(default)]
    pub tags: Vec<BundleTag>,
}

/// Project metadata carried for reference; import never renames the target project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleProject {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Suite in a bundle. `id` and `parent_id` are bundle-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BundleSuite {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub test_ids: Vec<String>,
}

/// Test case in a bundle; `tags` holds tag names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BundleTest {
    pub id: String,
    #[validate(length(min = 1, max = 255))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub content: TestContent,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Tag in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BundleTag {
    pub id: String,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(custom(function = "validate_hex_color"))]
    pub color: String,
}

/// Validates a `#rrggbb` color for use with the validator crate.
pub fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    let ok = value.len() == 7
        && value.starts_with('#')
        && value[1..].bytes().all(|b| b.is_ascii_hexdigit());
    if !ok {
        return Err(ValidationError::new("color").with_message(Cow::Borrowed("must be #rrggbb")));
    }
    Ok(())
}

/// Per-entity-type conflict policies. Tags have no create_new.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictResolution {
    pub tests: EntityResolution,
    pub suites: EntityResolution,
    pub tags: TagResolution,
}

/// How to apply a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    pub mode: ImportMode,
    pub conflict_resolution: ConflictResolution,
    pub dry_run: bool,
}

/// Request body for import and preview.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub data: Bundle,
    #[serde(default)]
    pub options: ImportOptions,
}

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// What to do with a test or suite whose natural key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityResolution {
    #[default]
    Skip,
    Overwrite,
    CreateNew,
}

/// What to do with a tag whose name already exists. Tags cannot be duplicated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TagResolution {
    #[default]
    Skip,
    Overwrite,
}

/// Merge into the current project, or wipe it first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImportMode {
    #[default]
    Merge,
    Replace,
}

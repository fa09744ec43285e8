//! Test content (description + ordered blocks) and its canonical fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Body of a test case version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

/// One block of test content (step, expected result, note, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl TestContent {
    /// SHA-256 (hex) over the canonical JSON form: object keys sorted at every depth,
    /// absent optional fields omitted. Equal content always yields the same fingerprint
    /// regardless of the key order it arrived in.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        let canonical = serde_json::to_string(&canonicalize(value))?;
        let digest = Sha256::digest(canonical.as_bytes());
        Ok(format!("{:x}", digest))
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

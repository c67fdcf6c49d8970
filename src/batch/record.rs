//! Input records and their annotated form.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{BatchError, BatchResult};
use crate::aggregate::OntologyMatch;

/// Key under which the match is attached to a record.
pub const MATCH_FIELD: &str = "edam_match";

/// One input item. Unknown fields are carried through untouched so the
/// annotated output keeps everything the input had.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageRecord(Map<String, Value>);

impl PackageRecord {
    pub fn new(name: &str, description: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String(name.into()));
        fields.insert("description".into(), Value::String(description.into()));
        Self(fields)
    }

    /// The package name, if present as a non-empty string.
    pub fn name(&self) -> Option<&str> {
        self.0
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
    }

    pub fn description(&self) -> Option<&str> {
        self.0.get("description").and_then(Value::as_str)
    }

    /// Name and description, or the first missing field.
    pub fn require_fields(&self, index: usize) -> BatchResult<(&str, &str)> {
        let name = self.name().ok_or_else(|| BatchError::MissingField {
            index,
            field: "name".into(),
        })?;
        let description = self.description().ok_or_else(|| BatchError::MissingField {
            index,
            field: "description".into(),
        })?;
        Ok((name, description))
    }

    /// A copy of this record with `edam_match` set.
    pub fn annotated(&self, result: &OntologyMatch) -> BatchResult<Self> {
        let value = serde_json::to_value(result).map_err(|e| BatchError::Serialize {
            what: "match".into(),
            message: e.to_string(),
        })?;
        let mut fields = self.0.clone();
        fields.insert(MATCH_FIELD.into(), value);
        Ok(Self(fields))
    }

    /// The attached match, if any.
    pub fn edam_match(&self) -> Option<OntologyMatch> {
        self.0
            .get(MATCH_FIELD)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for PackageRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Read a JSON array of records.
pub fn load_records(path: &Path) -> BatchResult<Vec<PackageRecord>> {
    let data = std::fs::read_to_string(path).map_err(|e| BatchError::Input {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|e| BatchError::Input {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

//! Curator metadata document and its validator.
//!
//! Documents are untrusted, so they are checked field by field against the
//! expected shape instead of being deserialized directly. The validator
//! collects every violation it finds rather than stopping at the first one,
//! which makes the warning logged for a bad document actionable.
//!
//! Expected shape:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "compatibility": {
//!     "vite": { "type": "compatible", "versions": "^6.0.0", "note": "optional" },
//!     "rollup": { "type": "incompatible", "reason": "uses Vite-only hooks" },
//!     "rolldown": { "type": "unknown" }
//!   }
//! }
//! ```
//!
//! Unknown keys are ignored.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::plugins::types::{PartialCompatibility, Tool, ToolCompatibility};
use crate::utils::semver_range;

/// The only schema version understood.
pub const SCHEMA_VERSION: u64 = 1;

/// A validated curator metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetadata {
    pub schema_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<PartialCompatibility>,
}

/// One problem found in a document, located by a JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Outcome of validating a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation<T> {
    Valid(T),
    Invalid(Vec<Violation>),
}

impl<T> Validation<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid(_))
    }

    /// Violations found, empty when valid.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Validation::Valid(_) => &[],
            Validation::Invalid(violations) => violations,
        }
    }

    pub fn into_result(self) -> std::result::Result<T, Vec<Violation>> {
        match self {
            Validation::Valid(value) => Ok(value),
            Validation::Invalid(violations) => Err(violations),
        }
    }
}

/// Validate a parsed JSON body as an [`ExternalMetadata`] document.
pub fn validate_metadata(value: &Value) -> Validation<ExternalMetadata> {
    let mut violations = Vec::new();

    let Some(root) = value.as_object() else {
        return Validation::Invalid(vec![Violation::new("$", "expected an object")]);
    };

    match root.get("schemaVersion") {
        None => violations.push(Violation::new("$.schemaVersion", "is required")),
        Some(v) if is_schema_version(v) => {}
        Some(v) => violations.push(Violation::new(
            "$.schemaVersion",
            format!("expected {}, got {}", SCHEMA_VERSION, v),
        )),
    }

    let compatibility = match root.get("compatibility") {
        None => None,
        Some(Value::Object(map)) => Some(validate_compatibility_map(map, &mut violations)),
        Some(_) => {
            violations.push(Violation::new("$.compatibility", "expected an object"));
            None
        }
    };

    if violations.is_empty() {
        Validation::Valid(ExternalMetadata {
            schema_version: SCHEMA_VERSION,
            compatibility,
        })
    } else {
        Validation::Invalid(violations)
    }
}

fn is_schema_version(value: &Value) -> bool {
    value.as_u64() == Some(SCHEMA_VERSION) || value.as_f64() == Some(SCHEMA_VERSION as f64)
}

fn validate_compatibility_map(
    map: &Map<String, Value>,
    violations: &mut Vec<Violation>,
) -> PartialCompatibility {
    let mut partial = PartialCompatibility::default();
    for tool in Tool::ALL {
        let Some(value) = map.get(tool.as_str()) else {
            continue;
        };
        let path = format!("$.compatibility.{}", tool);
        if let Some(compat) = validate_tool_compatibility(value, &path, violations) {
            partial.set(tool, compat);
        }
    }
    partial
}

/// Validate one tagged compatibility value, recording problems under `path`.
pub fn validate_tool_compatibility(
    value: &Value,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<ToolCompatibility> {
    let Some(obj) = value.as_object() else {
        violations.push(Violation::new(path, "expected an object"));
        return None;
    };

    let tag = match obj.get("type") {
        Some(Value::String(tag)) => tag.as_str(),
        Some(_) => {
            violations.push(Violation::new(format!("{}.type", path), "expected a string"));
            return None;
        }
        None => {
            violations.push(Violation::new(format!("{}.type", path), "is required"));
            return None;
        }
    };

    match tag {
        "compatible" => {
            let versions = required_string(obj, path, "versions", violations);
            let note = optional_string(obj, path, "note", violations);
            let versions = versions?;
            if !semver_range::is_valid_range(versions) {
                violations.push(Violation::new(
                    format!("{}.versions", path),
                    format!("'{}' is not a valid semver range", versions),
                ));
                return None;
            }
            Some(ToolCompatibility::Compatible {
                versions: versions.to_string(),
                note: note?.map(str::to_string),
            })
        }
        "incompatible" => {
            let reason = required_string(obj, path, "reason", violations)?;
            Some(ToolCompatibility::Incompatible {
                reason: reason.to_string(),
            })
        }
        "unknown" => Some(ToolCompatibility::Unknown),
        other => {
            violations.push(Violation::new(
                format!("{}.type", path),
                format!(
                    "expected one of compatible, incompatible, unknown; got '{}'",
                    other
                ),
            ));
            None
        }
    }
}

fn required_string<'a>(
    obj: &'a Map<String, Value>,
    path: &str,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<&'a str> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            violations.push(Violation::new(format!("{}.{}", path, key), "expected a string"));
            None
        }
        None => {
            violations.push(Violation::new(format!("{}.{}", path, key), "is required"));
            None
        }
    }
}

/// `Some(None)` when absent, `None` when present with the wrong type.
fn optional_string<'a>(
    obj: &'a Map<String, Value>,
    path: &str,
    key: &str,
    violations: &mut Vec<Violation>,
) -> Option<Option<&'a str>> {
    match obj.get(key) {
        None => Some(None),
        Some(Value::String(s)) => Some(Some(s.as_str())),
        Some(_) => {
            violations.push(Violation::new(format!("{}.{}", path, key), "expected a string"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_document() {
        let result = validate_metadata(&json!({ "schemaVersion": 1 }));
        assert_eq!(
            result,
            Validation::Valid(ExternalMetadata {
                schema_version: 1,
                compatibility: None
            })
        );
    }

    #[test]
    fn test_full_document() {
        let doc = json!({
            "schemaVersion": 1,
            "compatibility": {
                "vite": { "type": "compatible", "versions": "^5.0.0 || ^6.0.0", "note": "dev only" },
                "rollup": { "type": "incompatible", "reason": "uses configureServer" },
                "rolldown": { "type": "unknown" }
            },
            "extra": true
        });

        let meta = validate_metadata(&doc).into_result().unwrap();
        let compat = meta.compatibility.unwrap();
        assert_eq!(
            compat.vite,
            Some(ToolCompatibility::Compatible {
                versions: "^5.0.0 || ^6.0.0".to_string(),
                note: Some("dev only".to_string()),
            })
        );
        assert_eq!(
            compat.rollup,
            Some(ToolCompatibility::incompatible("uses configureServer"))
        );
        assert_eq!(compat.rolldown, Some(ToolCompatibility::Unknown));
    }

    #[test]
    fn test_wrong_schema_version_rejects_document() {
        let result = validate_metadata(&json!({
            "schemaVersion": 2,
            "compatibility": { "vite": { "type": "unknown" } }
        }));
        assert!(!result.is_valid());
        assert_eq!(result.violations()[0].path, "$.schemaVersion");
    }

    #[test]
    fn test_missing_schema_version() {
        let result = validate_metadata(&json!({}));
        assert_eq!(
            result.violations(),
            &[Violation::new("$.schemaVersion", "is required")]
        );
    }

    #[test]
    fn test_non_object_root() {
        assert!(!validate_metadata(&json!([1, 2])).is_valid());
        assert!(!validate_metadata(&json!("x")).is_valid());
    }

    #[test]
    fn test_collects_every_violation() {
        let result = validate_metadata(&json!({
            "schemaVersion": "1",
            "compatibility": {
                "vite": { "type": "compatible" },
                "rollup": { "type": "incompatible", "reason": 5 },
                "rolldown": { "type": "maybe" }
            }
        }));
        let paths: Vec<&str> = result.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "$.schemaVersion",
                "$.compatibility.vite.versions",
                "$.compatibility.rollup.reason",
                "$.compatibility.rolldown.type",
            ]
        );
    }

    #[test]
    fn test_invalid_semver_range() {
        let result = validate_metadata(&json!({
            "schemaVersion": 1,
            "compatibility": { "vite": { "type": "compatible", "versions": "newest" } }
        }));
        assert_eq!(result.violations().len(), 1);
        assert!(result.violations()[0].message.contains("semver"));
    }

    #[test]
    fn test_null_compatibility_rejected() {
        let result = validate_metadata(&json!({ "schemaVersion": 1, "compatibility": null }));
        assert!(!result.is_valid());
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::new("$.schemaVersion", "is required");
        assert_eq!(v.to_string(), "$.schemaVersion: is required");
    }
}

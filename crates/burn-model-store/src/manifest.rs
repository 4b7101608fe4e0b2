//! Packaged-model manifest loading
//!
//! Reads the `config.json` a packaged directory carries and answers the one
//! question the store asks of it: what class of network lives here. Any
//! failure to produce a manifest maps to [`StoreError::InvalidModel`]; the
//! caller-facing contract is "this is not a usable model", with the parser
//! detail kept to the reason string.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::StoreError;

/// The manifest key naming the network class.
pub const CLASS_NAME_KEY: &str = "_class_name";

/// Load a JSON manifest from `dir/file_name` as a key-value map.
pub fn load(dir: &Path, file_name: &str) -> Result<Map<String, Value>, StoreError> {
    let path = dir.join(file_name);
    let raw = fs::read_to_string(&path).map_err(|err| StoreError::InvalidModel {
        path: dir.to_path_buf(),
        reason: format!("cannot read {file_name}: {err}"),
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|err| StoreError::InvalidModel {
        path: dir.to_path_buf(),
        reason: format!("malformed {file_name}: {err}"),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidModel {
            path: dir.to_path_buf(),
            reason: format!("{file_name} holds {}, expected an object", json_kind(&other)),
        }),
    }
}

/// The declared network class, if the manifest names one.
pub fn class_name(manifest: &Map<String, Value>) -> Option<&str> {
    manifest.get(CLASS_NAME_KEY)?.as_str()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reads_class_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"_class_name": "ControlNetModel", "cross_attention_dim": 768}"#,
        )
        .unwrap();

        let manifest = load(dir.path(), "config.json").unwrap();
        assert_eq!(class_name(&manifest), Some("ControlNetModel"));
    }

    #[test]
    fn test_missing_manifest_is_invalid_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), "config.json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidModel { .. }));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_garbage_manifest_is_invalid_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "not json at all {").unwrap();
        let err = load(dir.path(), "config.json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidModel { .. }));
    }

    #[test]
    fn test_non_object_manifest_is_invalid_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "[1, 2, 3]").unwrap();
        let err = load(dir.path(), "config.json").unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_class_name_absent_or_not_a_string() {
        let mut manifest = Map::new();
        assert_eq!(class_name(&manifest), None);
        manifest.insert(CLASS_NAME_KEY.to_string(), Value::from(42));
        assert_eq!(class_name(&manifest), None);
    }
}

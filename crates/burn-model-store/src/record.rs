//! Persisted store records for ControlNet models
//!
//! A record is what the store's catalog knows about a model before touching
//! the filesystem: where it lives, which base family it belongs to, and
//! which layout it is in. The layout lives in the serialized form as a
//! `model_format` tag, so reading a record of one format as the other is a
//! parse error rather than a latent surprise.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::controlnet::ControlNetFormat;
use crate::types::BaseModel;

/// Catalog entry for a packaged (directory) ControlNet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffusersRecord {
    /// Model directory, absolute or relative to the store root.
    pub path: PathBuf,
    pub base: BaseModel,
}

/// Catalog entry for a single-file ControlNet checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Checkpoint file, absolute or relative to the store root.
    pub path: PathBuf,
    pub base: BaseModel,
    /// Base config JSON for conversion, when layout inference is not to be
    /// trusted for this checkpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// A catalog record, tagged by model format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model_format", rename_all = "lowercase")]
pub enum ControlNetRecord {
    Diffusers(DiffusersRecord),
    Checkpoint(CheckpointRecord),
}

impl ControlNetRecord {
    pub fn path(&self) -> &Path {
        match self {
            ControlNetRecord::Diffusers(record) => &record.path,
            ControlNetRecord::Checkpoint(record) => &record.path,
        }
    }

    pub fn base(&self) -> BaseModel {
        match self {
            ControlNetRecord::Diffusers(record) => record.base,
            ControlNetRecord::Checkpoint(record) => record.base,
        }
    }

    pub fn format(&self) -> ControlNetFormat {
        match self {
            ControlNetRecord::Diffusers(_) => ControlNetFormat::Diffusers,
            ControlNetRecord::Checkpoint(_) => ControlNetFormat::Checkpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_tag_with_model_format() {
        let record = ControlNetRecord::Diffusers(DiffusersRecord {
            path: PathBuf::from("controlnet/canny"),
            base: BaseModel::Sd1,
        });
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"model_format\":\"diffusers\""));

        let record = ControlNetRecord::Checkpoint(CheckpointRecord {
            path: PathBuf::from("controlnet/canny.safetensors"),
            base: BaseModel::Sd1,
            config_file: None,
        });
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"model_format\":\"checkpoint\""));
        // an absent config file is absent, not null
        assert!(!json.contains("config_file"));
    }

    #[test]
    fn test_record_round_trip() {
        let record = ControlNetRecord::Checkpoint(CheckpointRecord {
            path: PathBuf::from("controlnet/depth.safetensors"),
            base: BaseModel::Sdxl,
            config_file: Some(PathBuf::from("configs/depth.json")),
        });
        let json = serde_json::to_string(&record).unwrap();
        let parsed: ControlNetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.format(), ControlNetFormat::Checkpoint);
        assert_eq!(parsed.base(), BaseModel::Sdxl);
    }

    #[test]
    fn test_unknown_format_tag_is_rejected() {
        let json = r#"{"model_format": "olive", "path": "x", "base": "sd-1"}"#;
        assert!(serde_json::from_str::<ControlNetRecord>(json).is_err());
    }
}

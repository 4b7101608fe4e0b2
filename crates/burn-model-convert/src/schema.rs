//! On-disk layout of packaged ControlNet models
//!
//! A packaged model is a directory holding a `config.json` manifest and one
//! safetensors weight file per variant. This module owns the file names and
//! the manifest schema so the writer (conversion) and the readers (stores)
//! cannot drift apart.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Manifest file name inside a packaged directory.
pub const CONFIG_FILE: &str = "config.json";

/// Default-variant weight file name.
pub const WEIGHTS_FILE: &str = "diffusion_pytorch_model.safetensors";

/// Half-precision-variant weight file name.
pub const WEIGHTS_FILE_FP16: &str = "diffusion_pytorch_model.fp16.safetensors";

/// The manifest class a ControlNet package must declare.
pub const CONTROLNET_CLASS: &str = "ControlNetModel";

/// Errors reading or writing a packaged config
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The packaged `config.json` for a ControlNet.
///
/// Field names follow the packaged convention, so a manifest written here can
/// also be read by other tooling that understands that layout. Unknown fields
/// in hand-written configs are ignored on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(rename = "_class_name")]
    pub class_name: String,
    pub cross_attention_dim: usize,
    pub block_out_channels: Vec<usize>,
    #[serde(default = "default_conditioning_channels")]
    pub conditioning_channels: usize,
    #[serde(default = "default_layers_per_block")]
    pub layers_per_block: usize,
    #[serde(default)]
    pub down_block_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u32>,
}

fn default_conditioning_channels() -> usize {
    3
}

fn default_layers_per_block() -> usize {
    2
}

impl NetworkConfig {
    /// Read a config from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write the config as pretty-printed JSON.
    pub fn write_pretty<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

/// Whether `path` holds a complete packaged model.
///
/// Completeness means both the manifest and the default weight file exist.
/// Staging directories (`*.partial`) never satisfy this because they are
/// renamed into place only after both files are fully written.
pub fn is_packaged(path: &Path) -> bool {
    path.join(CONFIG_FILE).is_file() && path.join(WEIGHTS_FILE).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NetworkConfig {
        NetworkConfig {
            class_name: CONTROLNET_CLASS.to_string(),
            cross_attention_dim: 768,
            block_out_channels: vec![320, 640, 1280, 1280],
            conditioning_channels: 3,
            layers_per_block: 2,
            down_block_types: vec!["CrossAttnDownBlock2D".to_string(); 4],
            sample_size: Some(64),
        }
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = sample();
        config.write_pretty(&path).unwrap();
        let loaded = NetworkConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_class_name_serializes_with_underscore() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"_class_name\":\"ControlNetModel\""));
    }

    #[test]
    fn test_sparse_config_fills_defaults() {
        let json = r#"{
            "_class_name": "ControlNetModel",
            "cross_attention_dim": 1024,
            "block_out_channels": [320, 640, 1280, 1280]
        }"#;
        let config: NetworkConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.conditioning_channels, 3);
        assert_eq!(config.layers_per_block, 2);
        assert!(config.down_block_types.is_empty());
        assert_eq!(config.sample_size, None);
    }

    #[test]
    fn test_is_packaged_requires_both_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_packaged(dir.path()));

        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        assert!(!is_packaged(dir.path()));

        std::fs::write(dir.path().join(WEIGHTS_FILE), "stub").unwrap();
        assert!(is_packaged(dir.path()));
    }
}

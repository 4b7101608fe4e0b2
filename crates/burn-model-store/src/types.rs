//! Shared model taxonomy tags
//!
//! The string forms are part of the record format: they appear in persisted
//! JSON and must not drift.

use serde::{Deserialize, Serialize};

/// Base-model family a ControlNet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseModel {
    #[serde(rename = "sd-1")]
    Sd1,
    #[serde(rename = "sd-2")]
    Sd2,
    #[serde(rename = "sdxl")]
    Sdxl,
    #[serde(rename = "sdxl-refiner")]
    SdxlRefiner,
}

impl BaseModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseModel::Sd1 => "sd-1",
            BaseModel::Sd2 => "sd-2",
            BaseModel::Sdxl => "sdxl",
            BaseModel::SdxlRefiner => "sdxl-refiner",
        }
    }
}

impl std::fmt::Display for BaseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of model a store record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Main,
    Vae,
    Lora,
    ControlNet,
    Embedding,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Main => "main",
            ModelKind::Vae => "vae",
            ModelKind::Lora => "lora",
            ModelKind::ControlNet => "controlnet",
            ModelKind::Embedding => "embedding",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-model slot of a pipeline. ControlNets are monolithic and reject
/// every one of these; the type exists so requests are well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubModel {
    #[serde(rename = "unet")]
    UNet,
    TextEncoder,
    Tokenizer,
    Vae,
    Scheduler,
    SafetyChecker,
}

impl SubModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubModel::UNet => "unet",
            SubModel::TextEncoder => "text_encoder",
            SubModel::Tokenizer => "tokenizer",
            SubModel::Vae => "vae",
            SubModel::Scheduler => "scheduler",
            SubModel::SafetyChecker => "safety_checker",
        }
    }
}

impl std::fmt::Display for SubModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_model_tags() {
        assert_eq!(BaseModel::Sd1.as_str(), "sd-1");
        assert_eq!(BaseModel::SdxlRefiner.as_str(), "sdxl-refiner");
        assert_eq!(serde_json::to_string(&BaseModel::Sdxl).unwrap(), "\"sdxl\"");
        let parsed: BaseModel = serde_json::from_str("\"sd-2\"").unwrap();
        assert_eq!(parsed, BaseModel::Sd2);
    }

    #[test]
    fn test_model_kind_tags() {
        assert_eq!(ModelKind::ControlNet.as_str(), "controlnet");
        assert_eq!(
            serde_json::to_string(&ModelKind::ControlNet).unwrap(),
            "\"controlnet\""
        );
    }

    #[test]
    fn test_sub_model_tags() {
        assert_eq!(SubModel::UNet.as_str(), "unet");
        assert_eq!(SubModel::TextEncoder.as_str(), "text_encoder");
        assert_eq!(serde_json::to_string(&SubModel::UNet).unwrap(), "\"unet\"");
        assert_eq!(
            serde_json::to_string(&SubModel::SafetyChecker).unwrap(),
            "\"safety_checker\""
        );
    }
}

//! Network class resolution and materialized ControlNet weights
//!
//! [`ControlNetModel`] is the thing a successful load hands back: every
//! tensor of the network decoded to the requested precision and held
//! CPU-side as [`TensorData`], plus the parsed packaged config. Tensors are
//! uploaded to a backend device one at a time through [`ControlNetModel::tensor`],
//! so the store itself never commits to a backend.

use std::collections::HashMap;
use std::path::Path;

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use burn_model_convert::schema::{CONFIG_FILE, CONTROLNET_CLASS, NetworkConfig};
use burn_model_convert::{Archive, ConvertError};
use tracing::debug;

use crate::error::StoreError;
use crate::precision::PrecisionMode;
use crate::variant::WeightVariant;

/// Namespace packaged manifests resolve their `_class_name` in.
pub const CLASS_NAMESPACE: &str = "diffusers";

/// Network classes this store can materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkClass {
    ControlNet,
}

impl NetworkClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkClass::ControlNet => CONTROLNET_CLASS,
        }
    }
}

/// Map a manifest's namespace and class name to a known network class.
pub fn resolve_network_class(namespace: &str, class_name: &str) -> Option<NetworkClass> {
    match (namespace, class_name) {
        (CLASS_NAMESPACE, CONTROLNET_CLASS) => Some(NetworkClass::ControlNet),
        _ => None,
    }
}

/// A fully materialized ControlNet: config plus every weight tensor at one
/// precision.
#[derive(Debug, Clone)]
pub struct ControlNetModel {
    config: NetworkConfig,
    tensors: HashMap<String, TensorData>,
    precision: PrecisionMode,
}

impl ControlNetModel {
    /// Materialize one weight variant from a packaged directory.
    ///
    /// The whole weight file is decoded up front; a model that comes back
    /// `Ok` is complete, there is no lazy tail that can fail later.
    pub fn from_pretrained(
        dir: &Path,
        precision: PrecisionMode,
        variant: WeightVariant,
    ) -> Result<Self, StoreError> {
        let config = NetworkConfig::from_file(dir.join(CONFIG_FILE))
            .map_err(|err| StoreError::InvalidModel {
                path: dir.to_path_buf(),
                reason: format!("bad {CONFIG_FILE}: {err}"),
            })?;
        if config.class_name != CONTROLNET_CLASS {
            return Err(StoreError::InvalidModel {
                path: dir.to_path_buf(),
                reason: format!("declared class {:?} is not a ControlNet", config.class_name),
            });
        }

        let weights = dir.join(variant.file_name());
        if !weights.is_file() {
            return Err(StoreError::NotFound(weights));
        }

        let archive = Archive::open(&weights).map_err(ConvertError::from)?;
        let mut tensors = HashMap::with_capacity(archive.len());
        for name in archive.names() {
            let data = archive
                .tensor_data(name, precision.dtype())
                .map_err(ConvertError::from)?;
            tensors.insert(name.to_string(), data);
        }

        let model = Self {
            config,
            tensors,
            precision,
        };
        debug!(
            "Materialized {} from {} ({} tensors, {} params, {})",
            model.config.class_name,
            weights.display(),
            model.tensors.len(),
            model.num_params(),
            precision
        );
        Ok(model)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn precision(&self) -> PrecisionMode {
        self.precision
    }

    /// Total parameter count across all tensors.
    pub fn num_params(&self) -> u64 {
        self.tensors
            .values()
            .map(|data| data.shape.iter().product::<usize>() as u64)
            .sum()
    }

    /// Bytes the materialized tensors occupy.
    pub fn size_bytes(&self) -> u64 {
        self.tensors
            .values()
            .map(|data| data.as_bytes().len() as u64)
            .sum()
    }

    /// Tensor names in sorted order.
    pub fn tensor_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// The raw data of one tensor, if present.
    pub fn data(&self, name: &str) -> Option<&TensorData> {
        self.tensors.get(name)
    }

    /// Upload one tensor to a device.
    ///
    /// Panics if `D` does not match the stored rank, like any
    /// `Tensor::from_data` call with the wrong rank.
    pub fn tensor<B: Backend, const D: usize>(
        &self,
        name: &str,
        device: &B::Device,
    ) -> Option<Tensor<B, D>> {
        self.tensors
            .get(name)
            .map(|data| Tensor::from_data(data.clone(), device))
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_model() -> ControlNetModel {
        let mut tensors = HashMap::new();
        tensors.insert(
            "conv_in.weight".to_string(),
            TensorData::new(vec![0.0f32; 6], vec![2, 3]),
        );
        tensors.insert(
            "conv_in.bias".to_string(),
            TensorData::new(vec![1.0f32; 2], vec![2]),
        );
        ControlNetModel {
            config: NetworkConfig {
                class_name: CONTROLNET_CLASS.to_string(),
                cross_attention_dim: 768,
                block_out_channels: vec![320],
                conditioning_channels: 3,
                layers_per_block: 2,
                down_block_types: vec![],
                sample_size: Some(64),
            },
            tensors,
            precision: PrecisionMode::Fp32,
        }
    }

    #[test]
    fn test_resolve_known_class() {
        assert_eq!(
            resolve_network_class("diffusers", "ControlNetModel"),
            Some(NetworkClass::ControlNet)
        );
    }

    #[test]
    fn test_resolve_unknown_class() {
        assert_eq!(resolve_network_class("diffusers", "UNet2DConditionModel"), None);
        assert_eq!(resolve_network_class("transformers", "ControlNetModel"), None);
    }

    #[test]
    fn test_param_and_byte_accounting() {
        let model = toy_model();
        assert_eq!(model.num_params(), 8);
        assert_eq!(model.size_bytes(), 8 * 4);
        assert_eq!(model.len(), 2);
        assert!(!model.is_empty());
    }

    #[test]
    fn test_tensor_names_sorted() {
        let model = toy_model();
        assert_eq!(model.tensor_names(), vec!["conv_in.bias", "conv_in.weight"]);
    }

    #[test]
    fn test_data_lookup() {
        let model = toy_model();
        assert!(model.data("conv_in.weight").is_some());
        assert!(model.data("missing").is_none());
        assert_eq!(model.data("conv_in.bias").unwrap().shape, vec![2]);
    }
}

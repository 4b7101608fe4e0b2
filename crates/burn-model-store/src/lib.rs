//! ControlNet Model Store
//!
//! This crate manages ControlNet models on disk: telling packaged
//! directories apart from single-file checkpoints, validating and sizing
//! packaged models, materializing their weights at a chosen precision, and
//! converting checkpoints into the packaged layout through a bounded,
//! content-addressed cache.
//!
//! # Opening and loading a model
//!
//! ```ignore
//! use burn_model_store::{BaseModel, ControlNetHandle, ModelKind, PrecisionMode};
//!
//! let mut handle = ControlNetHandle::new(path, BaseModel::Sd1, ModelKind::ControlNet)?;
//! println!("~{} bytes on disk", handle.size(None)?);
//!
//! let model = handle.load(PrecisionMode::Fp16, None)?;
//! println!("{} params in memory", model.num_params());
//! ```
//!
//! # Records and conversion
//!
//! Catalog records carry a `model_format` tag. Resolving a record to a
//! loadable directory goes through
//! [`ControlNetHandle::convert_if_required`], which converts checkpoint
//! records on first use and reuses the cached artifact afterwards:
//!
//! ```ignore
//! use burn_model_store::{ControlNetHandle, ControlNetRecord, StoreConfig};
//!
//! let config = StoreConfig::new("/models").with_conversion_cache_gib(10.0);
//! let record: ControlNetRecord = serde_json::from_str(&raw)?;
//! let dir = ControlNetHandle::convert_if_required(&record, &config)?;
//! let handle = ControlNetHandle::new(dir, record.base(), ModelKind::ControlNet)?;
//! ```

pub mod config;
pub mod controlnet;
pub mod error;
pub mod manifest;
pub mod network;
pub mod precision;
pub mod record;
pub mod size;
pub mod types;
pub mod variant;

pub use config::{DEFAULT_CONVERSION_CACHE_GIB, StoreConfig};
pub use controlnet::{CHECKPOINT_EXTENSIONS, ControlNetFormat, ControlNetHandle, detect_format};
pub use error::{AttemptList, StoreError, VariantAttempt};
pub use network::{ControlNetModel, NetworkClass, resolve_network_class};
pub use precision::PrecisionMode;
pub use record::{CheckpointRecord, ControlNetRecord, DiffusersRecord};
pub use size::{SizeEstimate, size_of_fs};
pub use types::{BaseModel, ModelKind, SubModel};
pub use variant::WeightVariant;

// the converter is part of this crate's contract; let callers reach it
// without a separate dependency line
pub use burn_model_convert as convert;

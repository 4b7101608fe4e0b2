//! ControlNet model handle
//!
//! [`ControlNetHandle`] is the store's view of one packaged ControlNet on
//! disk: construction validates the layout and manifest, `size` answers
//! memory questions without touching weights, and `load` materializes the
//! network at a requested precision. Single-file checkpoints never get a
//! handle directly; [`ControlNetHandle::convert_if_required`] turns their
//! records into a packaged directory first.

use std::fs;
use std::path::{Path, PathBuf};

use burn_model_convert::schema::{CONFIG_FILE, CONTROLNET_CLASS, is_packaged};
use burn_model_convert::{
    ConvertError, ConvertOptions, conversion_output_path, convert_controlnet_checkpoint,
    trim_conversion_cache, trim_target,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{AttemptList, StoreError, VariantAttempt};
use crate::manifest;
use crate::network::{CLASS_NAMESPACE, ControlNetModel, NetworkClass, resolve_network_class};
use crate::precision::PrecisionMode;
use crate::record::{CheckpointRecord, ControlNetRecord};
use crate::size::{SizeEstimate, size_of_fs};
use crate::types::{BaseModel, ModelKind, SubModel};
use crate::variant::WeightVariant;

/// File extensions recognized as single-file checkpoints.
pub const CHECKPOINT_EXTENSIONS: [&str; 4] = ["safetensors", "ckpt", "pt", "pth"];

/// The two layouts a ControlNet can arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlNetFormat {
    /// Packaged directory: `config.json` plus safetensors weights.
    Diffusers,
    /// Single-file checkpoint.
    Checkpoint,
}

impl ControlNetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlNetFormat::Diffusers => "diffusers",
            ControlNetFormat::Checkpoint => "checkpoint",
        }
    }
}

impl std::fmt::Display for ControlNetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a model path by layout.
///
/// A directory with a `config.json` is packaged; a file with a known
/// checkpoint extension is a checkpoint, whatever its container turns out
/// to hold. Everything else is no model at all.
pub fn detect_format<P: AsRef<Path>>(path: P) -> Result<ControlNetFormat, StoreError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        if path.join(CONFIG_FILE).is_file() {
            return Ok(ControlNetFormat::Diffusers);
        }
        return Err(StoreError::InvalidFormat(path.to_path_buf()));
    }
    let recognized = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            CHECKPOINT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false);
    if recognized {
        Ok(ControlNetFormat::Checkpoint)
    } else {
        Err(StoreError::InvalidFormat(path.to_path_buf()))
    }
}

/// Handle on one packaged ControlNet directory.
#[derive(Debug)]
pub struct ControlNetHandle {
    path: PathBuf,
    base: BaseModel,
    class: NetworkClass,
    size: SizeEstimate,
}

impl ControlNetHandle {
    /// Open a handle on a packaged ControlNet.
    ///
    /// Validates up front that the path is a packaged directory whose
    /// manifest declares a ControlNet, and takes a size estimate from the
    /// files on disk. No weights are read here.
    pub fn new<P: AsRef<Path>>(
        path: P,
        base: BaseModel,
        kind: ModelKind,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if kind != ModelKind::ControlNet {
            return Err(StoreError::InvalidModel {
                path: path.to_path_buf(),
                reason: format!("model kind {kind} is not handled by the ControlNet store"),
            });
        }

        let format = detect_format(path)?;
        if format != ControlNetFormat::Diffusers {
            return Err(StoreError::InvalidModel {
                path: path.to_path_buf(),
                reason: "single-file checkpoints must be converted before opening".to_string(),
            });
        }

        let manifest = manifest::load(path, CONFIG_FILE)?;
        let class_name =
            manifest::class_name(&manifest).ok_or_else(|| StoreError::InvalidModel {
                path: path.to_path_buf(),
                reason: format!("{CONFIG_FILE} does not declare a class name"),
            })?;
        if class_name != CONTROLNET_CLASS {
            return Err(StoreError::InvalidModel {
                path: path.to_path_buf(),
                reason: format!("declared class {class_name:?} is not a ControlNet"),
            });
        }
        let class = resolve_network_class(CLASS_NAMESPACE, class_name).ok_or_else(|| {
            StoreError::InvalidModel {
                path: path.to_path_buf(),
                reason: format!("no loader for network class {class_name:?}"),
            }
        })?;

        let size = SizeEstimate::Estimated(size_of_fs(path));
        debug!(
            "Opened ControlNet handle at {} (base {}, ~{} bytes)",
            path.display(),
            base,
            size.bytes()
        );
        Ok(Self {
            path: path.to_path_buf(),
            base,
            class,
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base(&self) -> BaseModel {
        self.base
    }

    pub fn network_class(&self) -> NetworkClass {
        self.class
    }

    /// Bytes this model needs, for cache budgeting.
    ///
    /// ControlNets are monolithic, so any sub-model request is refused
    /// rather than answered with a number that means nothing.
    pub fn size(&self, sub: Option<SubModel>) -> Result<u64, StoreError> {
        if let Some(requested) = sub {
            return Err(StoreError::SubModel { requested });
        }
        Ok(self.size.bytes())
    }

    /// The current size value together with how it was obtained.
    pub fn size_estimate(&self) -> SizeEstimate {
        self.size
    }

    /// Materialize the network at `precision`.
    ///
    /// Weight variants are tried in [`WeightVariant::PRIORITY`] order and
    /// the first that loads wins. If every variant fails, the error lists
    /// each variant with its failure, so a directory that is missing one
    /// file and has a corrupt other says so in one message.
    ///
    /// On success the handle's size becomes a measured count taken from the
    /// materialized tensors, which reflects the requested precision rather
    /// than the on-disk file sizes.
    pub fn load(
        &mut self,
        precision: PrecisionMode,
        sub: Option<SubModel>,
    ) -> Result<ControlNetModel, StoreError> {
        if let Some(requested) = sub {
            return Err(StoreError::SubModel { requested });
        }

        let mut attempts = AttemptList::default();
        for variant in WeightVariant::PRIORITY {
            match self.materialize(precision, variant) {
                Ok(model) => {
                    if !attempts.0.is_empty() {
                        debug!("Loaded {} weights after skipping: {}", variant, attempts);
                    }
                    self.size = SizeEstimate::Measured(model.size_bytes());
                    return Ok(model);
                }
                Err(err) => {
                    attempts.0.push(VariantAttempt {
                        variant,
                        reason: err.to_string(),
                    });
                }
            }
        }

        Err(StoreError::VariantsExhausted {
            dir: self.path.clone(),
            attempts,
        })
    }

    fn materialize(
        &self,
        precision: PrecisionMode,
        variant: WeightVariant,
    ) -> Result<ControlNetModel, StoreError> {
        match self.class {
            NetworkClass::ControlNet => {
                ControlNetModel::from_pretrained(&self.path, precision, variant)
            }
        }
    }

    /// Resolve a record to a packaged directory, converting if needed.
    ///
    /// Packaged records pass through untouched. Checkpoint records are
    /// converted into the store's conversion cache, reusing a previous
    /// conversion of the same source when one is already there.
    pub fn convert_if_required(
        record: &ControlNetRecord,
        config: &StoreConfig,
    ) -> Result<PathBuf, StoreError> {
        match record {
            ControlNetRecord::Diffusers(record) => Ok(config.resolve(&record.path)),
            ControlNetRecord::Checkpoint(record) => convert_and_cache(record, config),
        }
    }
}

/// Convert a checkpoint into the conversion cache, trimming it first so the
/// new artifact fits the budget.
fn convert_and_cache(
    record: &CheckpointRecord,
    config: &StoreConfig,
) -> Result<PathBuf, StoreError> {
    let weights = config.resolve(&record.path);
    let meta = fs::metadata(&weights).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(weights.clone())
        } else {
            ConvertError::from(err).into()
        }
    })?;

    let cache_dir = config.conversion_cache_dir();
    let dest = conversion_output_path(&cache_dir, &weights);
    if is_packaged(&dest) {
        debug!("Conversion cache hit for {}", weights.display());
        return Ok(dest);
    }
    if dest.exists() {
        // an earlier conversion died between creating the entry and
        // publishing both files; the remnant is unusable
        warn!("Discarding incomplete cache entry {}", dest.display());
        fs::remove_dir_all(&dest).map_err(ConvertError::from)?;
    }

    let budget = trim_target(config.conversion_cache_bytes, meta.len());
    let outcome = trim_conversion_cache(&cache_dir, budget).map_err(ConvertError::from)?;
    if outcome.evicted > 0 {
        info!(
            "Trimmed conversion cache: {} entries evicted, {} bytes freed",
            outcome.evicted, outcome.freed_bytes
        );
    }
    fs::create_dir_all(&cache_dir).map_err(ConvertError::from)?;

    let mut options = ConvertOptions::for_source(&weights);
    options.base_config = record.config_file.as_ref().map(|p| config.resolve(p));
    let report = convert_controlnet_checkpoint(&weights, &dest, &options)?;
    info!(
        "Cached converted ControlNet at {} ({} tensors)",
        dest.display(),
        report.tensors_written
    );
    Ok(dest)
}

//! Checkpoint-to-packaged ControlNet conversion
//!
//! Takes a single-file checkpoint and writes a packaged directory next to
//! nothing else: a `config.json` synthesized from the checkpoint's layout
//! (or taken from a caller-supplied base config) and one safetensors file
//! with the tensors under their packaged names. Payload bytes and dtypes
//! are copied untouched.
//!
//! The output is published atomically: everything is written into a
//! `<dest>.partial` staging directory, which is renamed to `dest` only once
//! both files are complete. A crash mid-conversion leaves a stale staging
//! directory, never a half-readable package.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use safetensors::tensor::TensorView;
use tracing::{info, warn};

use crate::archive::{Archive, ArchiveError};
use crate::keymap::translate_all;
use crate::probe::{self, ProbeError};
use crate::schema::{CONFIG_FILE, ConfigError, NetworkConfig, WEIGHTS_FILE};

/// Errors from converting a checkpoint
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot infer network layout: {0}")]
    Probe(#[from] ProbeError),

    /// The source is in a container this converter refuses to read
    #[error("Unsupported source {path}: {reason}")]
    UnsupportedSource { path: PathBuf, reason: String },

    /// The source parsed but its contents are not a usable ControlNet
    #[error("Corrupt checkpoint {path}: {reason}")]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialize(safetensors::SafeTensorError),
}

/// Knobs for one conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Base config JSON overriding layout inference, when the caller knows
    /// better than the checkpoint.
    pub base_config: Option<PathBuf>,
    /// Render resolution the packaged config is annotated with.
    pub image_size: u32,
    /// Validate tensor metadata against payloads before converting.
    pub scan: bool,
    /// Whether the source container is safetensors. Anything else is
    /// rejected: legacy pickle checkpoints cannot be read safely.
    pub from_safetensors: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            base_config: None,
            image_size: 512,
            scan: true,
            from_safetensors: true,
        }
    }
}

impl ConvertOptions {
    /// Defaults with `from_safetensors` read off the source's extension.
    pub fn for_source(source: &Path) -> Self {
        let from_safetensors = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("safetensors"))
            .unwrap_or(false);
        Self {
            from_safetensors,
            ..Self::default()
        }
    }
}

/// What a conversion produced.
#[derive(Debug)]
pub struct ConvertReport {
    /// Tensors written to the packaged weight file.
    pub tensors_written: usize,
    /// Checkpoint tensors with no packaged counterpart, left behind.
    pub skipped: Vec<String>,
    /// The manifest that was written.
    pub config: NetworkConfig,
}

/// Convert a checkpoint file into a packaged directory at `dest`.
///
/// `dest` must not already exist; idempotency checks belong to the caller,
/// which knows the caching policy. On success the packaged directory is in
/// place and complete.
pub fn convert_controlnet_checkpoint(
    source: &Path,
    dest: &Path,
    options: &ConvertOptions,
) -> Result<ConvertReport, ConvertError> {
    if !options.from_safetensors {
        return Err(ConvertError::UnsupportedSource {
            path: source.to_path_buf(),
            reason: "legacy pickle checkpoints cannot be read safely; re-export as safetensors"
                .to_string(),
        });
    }

    let archive = Archive::open(source)?;
    if options.scan {
        archive.validate()?;
    }

    let shapes = archive.shapes();
    let flavor = probe::detect_flavor(&shapes);
    let mut config = match &options.base_config {
        Some(path) => NetworkConfig::from_file(path)?,
        None => probe::infer_config(&shapes)?,
    };
    if config.sample_size.is_none() {
        config.sample_size = Some(options.image_size / 8);
    }

    info!(
        "Converting {} ControlNet checkpoint {} ({} tensors)",
        flavor,
        source.display(),
        archive.len()
    );

    let mut names = archive.names();
    names.sort_unstable();
    let translated = translate_all(names);
    if translated.mapped.is_empty() {
        return Err(ConvertError::CorruptCheckpoint {
            path: source.to_path_buf(),
            reason: "no recognizable ControlNet tensors".to_string(),
        });
    }
    if !translated.skipped.is_empty() {
        warn!(
            "Skipping {} checkpoint tensors with no packaged counterpart",
            translated.skipped.len()
        );
    }

    let mut mapping = BTreeMap::new();
    for (target, source_name) in &translated.mapped {
        if let Some(previous) = mapping.insert(target.clone(), source_name.clone()) {
            return Err(ConvertError::CorruptCheckpoint {
                path: source.to_path_buf(),
                reason: format!("{previous} and {source_name} both map to {target}"),
            });
        }
    }

    let staging = staging_dir(dest);
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    match write_package(&archive, &mapping, &config, &staging) {
        Ok(()) => {
            fs::rename(&staging, dest)?;
            info!(
                "Converted {} -> {} ({} tensors)",
                source.display(),
                dest.display(),
                mapping.len()
            );
            Ok(ConvertReport {
                tensors_written: mapping.len(),
                skipped: translated.skipped,
                config,
            })
        }
        Err(err) => {
            // leave no half-written staging directory behind
            let _ = fs::remove_dir_all(&staging);
            Err(err)
        }
    }
}

/// Write manifest and weights into the staging directory.
fn write_package(
    archive: &Archive,
    mapping: &BTreeMap<String, String>,
    config: &NetworkConfig,
    staging: &Path,
) -> Result<(), ConvertError> {
    config.write_pretty(staging.join(CONFIG_FILE))?;

    let mut views = Vec::with_capacity(mapping.len());
    for (target, source_name) in mapping {
        let raw = archive.raw(source_name)?;
        let view = TensorView::new(raw.dtype, raw.shape.to_vec(), raw.bytes)
            .map_err(ConvertError::Serialize)?;
        views.push((target.clone(), view));
    }
    safetensors::serialize_to_file(views, &None, &staging.join(WEIGHTS_FILE))
        .map_err(ConvertError::Serialize)?;
    Ok(())
}

/// Staging sibling for a destination: `canny-4f09f1c3a27b.partial`.
fn staging_dir(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

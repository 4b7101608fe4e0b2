//! ControlNet Checkpoint Conversion
//!
//! This crate turns single-file ControlNet checkpoints (CompVis naming,
//! safetensors container) into packaged model directories (a `config.json`
//! manifest plus a safetensors weight file under packaged names), and gives
//! readers mmap-backed access to either form.
//!
//! # Reading weights
//!
//! ```ignore
//! use burn_model_convert::Archive;
//! use safetensors::Dtype;
//!
//! let archive = Archive::open("model.safetensors")?;
//! let data = archive.tensor_data("conv_in.weight", Dtype::F32)?;
//! ```
//!
//! # Converting a checkpoint
//!
//! ```ignore
//! use burn_model_convert::{convert_controlnet_checkpoint, ConvertOptions};
//!
//! let options = ConvertOptions::for_source(&source);
//! let report = convert_controlnet_checkpoint(&source, &dest, &options)?;
//! println!("wrote {} tensors", report.tensors_written);
//! ```
//!
//! # Cache bookkeeping
//!
//! Converted artifacts are cached by source identity; see
//! [`conversion_output_path`] and [`trim_conversion_cache`].

pub mod archive;
pub mod cache;
pub mod convert;
pub mod keymap;
pub mod probe;
pub mod schema;

pub use archive::{Archive, ArchiveError, RawTensor};
pub use cache::{
    GIB, TrimOutcome, conversion_output_path, entry_size, trim_conversion_cache, trim_target,
};
pub use convert::{ConvertError, ConvertOptions, ConvertReport, convert_controlnet_checkpoint};
pub use keymap::{TranslatedKeys, translate_all, translate_key};
pub use probe::{NetworkFlavor, ProbeError, TensorShapes, detect_flavor, infer_config};
pub use schema::{
    CONFIG_FILE, CONTROLNET_CLASS, ConfigError, NetworkConfig, WEIGHTS_FILE, WEIGHTS_FILE_FP16,
    is_packaged,
};

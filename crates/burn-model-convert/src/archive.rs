//! Memory-mapped safetensors archives
//!
//! Checkpoint and packaged weight files are read through [`Archive`], which
//! memory-maps the file and indexes tensor metadata up front. Tensor payloads
//! stay on disk until they are requested, so opening a multi-gigabyte
//! checkpoint costs a header parse rather than a full read.
//!
//! Payloads can be handed out two ways:
//!
//! - [`Archive::raw`] borrows the untouched bytes together with their dtype
//!   and shape, which is what dtype-preserving conversion wants.
//! - [`Archive::tensor_data`] decodes into a [`TensorData`] at a requested
//!   dtype, widening or narrowing through f32 as needed.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use burn::tensor::TensorData;
use half::{bf16, f16};
use memmap2::Mmap;
use safetensors::{Dtype, SafeTensors};

/// Errors that can occur while reading a safetensors archive
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// IO error opening or mapping the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The safetensors header could not be parsed
    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    /// A requested tensor does not exist in the archive
    #[error("Tensor not found: {0}")]
    TensorNotFound(String),

    /// The tensor's dtype has no supported decode path
    #[error("Unsupported dtype {0:?} for tensor {1}")]
    UnsupportedDtype(Dtype, String),

    /// The tensor's metadata does not agree with its payload
    #[error("Corrupt tensor {name}: {reason}")]
    CorruptTensor { name: String, reason: String },
}

/// Metadata for a single tensor: dtype, shape, and byte range in the mmap.
struct TensorInfo {
    dtype: Dtype,
    shape: Vec<usize>,
    start: usize,
    end: usize,
}

/// A borrowed view of one tensor's untouched payload.
pub struct RawTensor<'a> {
    pub dtype: Dtype,
    pub shape: &'a [usize],
    pub bytes: &'a [u8],
}

/// A memory-mapped safetensors file with an index of its tensors.
pub struct Archive {
    mmap: Mmap,
    tensors: HashMap<String, TensorInfo>,
}

impl Archive {
    /// Open a safetensors file and index its tensors.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };

        // Parse the header once, then keep only byte offsets relative to the
        // mapping so the borrowed SafeTensors view can be dropped.
        let st = SafeTensors::deserialize(&mmap)?;
        let base = mmap.as_ptr() as usize;
        let mut tensors = HashMap::new();
        for (name, view) in st.tensors() {
            let start = view.data().as_ptr() as usize - base;
            let end = start + view.data().len();
            tensors.insert(
                name.to_string(),
                TensorInfo {
                    dtype: view.dtype(),
                    shape: view.shape().to_vec(),
                    start,
                    end,
                },
            );
        }

        Ok(Self { mmap, tensors })
    }

    /// Names of all tensors in the archive, in arbitrary order.
    pub fn names(&self) -> Vec<&str> {
        self.tensors.keys().map(|s| s.as_str()).collect()
    }

    /// Whether the archive contains a tensor with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Shape of a tensor, if present.
    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.tensors.get(name).map(|t| t.shape.as_slice())
    }

    /// Dtype of a tensor, if present.
    pub fn dtype(&self, name: &str) -> Option<Dtype> {
        self.tensors.get(name).map(|t| t.dtype)
    }

    /// Number of tensors in the archive.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of elements across all tensors.
    pub fn num_params(&self) -> u64 {
        self.tensors
            .values()
            .map(|t| t.shape.iter().product::<usize>() as u64)
            .sum()
    }

    /// Total payload size in bytes across all tensors.
    pub fn data_len(&self) -> u64 {
        self.tensors.values().map(|t| (t.end - t.start) as u64).sum()
    }

    /// A name-to-shape map of the whole archive, for layout probing.
    pub fn shapes(&self) -> HashMap<String, Vec<usize>> {
        self.tensors
            .iter()
            .map(|(name, info)| (name.clone(), info.shape.clone()))
            .collect()
    }

    /// Borrow one tensor's payload without decoding it.
    pub fn raw(&self, name: &str) -> Result<RawTensor<'_>, ArchiveError> {
        let info = self.info(name)?;
        Ok(RawTensor {
            dtype: info.dtype,
            shape: &info.shape,
            bytes: &self.mmap[info.start..info.end],
        })
    }

    /// Decode one tensor into a [`TensorData`] with the target dtype.
    ///
    /// Sources and targets may be any of f32, f16, and bf16. Conversion goes
    /// through f32, so same-dtype reads round-trip exactly and narrowing
    /// rounds the way the `half` crate rounds.
    pub fn tensor_data(&self, name: &str, target: Dtype) -> Result<TensorData, ArchiveError> {
        let info = self.info(name)?;
        let bytes = &self.mmap[info.start..info.end];
        let shape = info.shape.clone();

        let values = match info.dtype {
            Dtype::F32 => read_f32(bytes),
            Dtype::F16 => bytes
                .chunks_exact(2)
                .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
            Dtype::BF16 => bytes
                .chunks_exact(2)
                .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
            other => return Err(ArchiveError::UnsupportedDtype(other, name.to_string())),
        };

        match target {
            Dtype::F32 => Ok(TensorData::new(values, shape)),
            Dtype::F16 => Ok(TensorData::new(
                values.into_iter().map(f16::from_f32).collect::<Vec<_>>(),
                shape,
            )),
            Dtype::BF16 => Ok(TensorData::new(
                values.into_iter().map(bf16::from_f32).collect::<Vec<_>>(),
                shape,
            )),
            other => Err(ArchiveError::UnsupportedDtype(other, name.to_string())),
        }
    }

    /// Check every tensor's metadata against its payload.
    ///
    /// Catches headers whose shapes disagree with the stored byte ranges and
    /// ranges that fall outside the mapping. Dtypes with an unknown element
    /// width are only bounds-checked.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        for (name, info) in &self.tensors {
            if info.start > info.end || info.end > self.mmap.len() {
                return Err(ArchiveError::CorruptTensor {
                    name: name.clone(),
                    reason: format!(
                        "byte range {}..{} outside file of {} bytes",
                        info.start,
                        info.end,
                        self.mmap.len()
                    ),
                });
            }
            let numel = info
                .shape
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(|| ArchiveError::CorruptTensor {
                    name: name.clone(),
                    reason: format!("shape {:?} overflows", info.shape),
                })?;
            if let Some(width) = dtype_size(info.dtype) {
                let expected = numel * width;
                let actual = info.end - info.start;
                if expected != actual {
                    return Err(ArchiveError::CorruptTensor {
                        name: name.clone(),
                        reason: format!(
                            "shape {:?} as {:?} wants {} bytes, payload has {}",
                            info.shape, info.dtype, expected, actual
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn info(&self, name: &str) -> Result<&TensorInfo, ArchiveError> {
        self.tensors
            .get(name)
            .ok_or_else(|| ArchiveError::TensorNotFound(name.to_string()))
    }
}

/// Element width in bytes for dtypes this crate knows about.
fn dtype_size(dtype: Dtype) -> Option<usize> {
    match dtype {
        Dtype::BOOL | Dtype::U8 | Dtype::I8 => Some(1),
        Dtype::F16 | Dtype::BF16 | Dtype::I16 | Dtype::U16 => Some(2),
        Dtype::F32 | Dtype::I32 | Dtype::U32 => Some(4),
        Dtype::F64 | Dtype::I64 | Dtype::U64 => Some(8),
        _ => None,
    }
}

fn read_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

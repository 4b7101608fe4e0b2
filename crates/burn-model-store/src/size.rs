//! Model size accounting

use std::path::Path;

use walkdir::WalkDir;

/// A byte count that knows how it was obtained.
///
/// Handles start with an [`Estimated`](SizeEstimate::Estimated) size from a
/// filesystem scan; once weights have actually been materialized the handle
/// upgrades to a [`Measured`](SizeEstimate::Measured) count derived from the
/// in-memory tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeEstimate {
    Estimated(u64),
    Measured(u64),
}

impl SizeEstimate {
    pub fn bytes(&self) -> u64 {
        match self {
            SizeEstimate::Estimated(bytes) | SizeEstimate::Measured(bytes) => *bytes,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, SizeEstimate::Measured(_))
    }
}

/// On-disk footprint of a model path.
///
/// A file is its own size, a directory is the sum of the files under it.
/// Unreadable entries count zero, so a missing path reports an empty model
/// rather than an error; constructors check existence before getting here.
pub fn size_of_fs<P: AsRef<Path>>(path: P) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

//! Conversion cache bookkeeping
//!
//! Converted artifacts live under a single cache directory, one entry per
//! source checkpoint. Entry names are derived from the source path, so the
//! same checkpoint always converts to the same place and a re-run can reuse
//! it. The cache is bounded: before a new conversion, it is trimmed until
//! the new artifact has room.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One binary gibibyte.
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Cache directory entry for a source checkpoint.
///
/// The name is the source's file stem plus a digest of its absolute path,
/// readable in directory listings and stable across runs:
/// `canny-sd15-4f09f1c3a27b`.
pub fn conversion_output_path(cache_dir: &Path, source: &Path) -> PathBuf {
    let absolute = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(absolute.as_os_str().as_encoded_bytes());
    let digest = hex::encode(hasher.finalize());

    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model");
    cache_dir.join(format!("{stem}-{}", &digest[..12]))
}

/// Cache budget left for existing entries once a new artifact of
/// `size_needed` bytes lands.
pub fn trim_target(max_cache_bytes: u64, size_needed: u64) -> u64 {
    max_cache_bytes.saturating_sub(size_needed)
}

/// What a trim pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrimOutcome {
    /// Entries found in the cache directory.
    pub scanned: usize,
    /// Entries removed.
    pub evicted: usize,
    /// Bytes reclaimed.
    pub freed_bytes: u64,
    /// Bytes still used after trimming.
    pub total_bytes: u64,
}

/// Evict cache entries, oldest first, until the cache fits `max_bytes`.
///
/// Age is the entry's access time where the filesystem tracks it, falling
/// back to modification time. Stale staging directories left behind by an
/// interrupted conversion are ordinary entries here and age out like any
/// other. A missing cache directory is an empty cache.
pub fn trim_conversion_cache(cache_dir: &Path, max_bytes: u64) -> io::Result<TrimOutcome> {
    let mut outcome = TrimOutcome::default();
    if !cache_dir.exists() {
        return Ok(outcome);
    }

    struct Entry {
        path: PathBuf,
        size: u64,
        stamp: SystemTime,
    }

    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(cache_dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let stamp = dir_entry
            .metadata()
            .and_then(|meta| meta.accessed().or_else(|_| meta.modified()))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push(Entry {
            size: entry_size(&path),
            path,
            stamp,
        });
    }

    outcome.scanned = entries.len();
    outcome.total_bytes = entries.iter().map(|e| e.size).sum();
    entries.sort_by_key(|e| e.stamp);

    for entry in entries {
        if outcome.total_bytes <= max_bytes {
            break;
        }
        let removed = if entry.path.is_dir() {
            std::fs::remove_dir_all(&entry.path)
        } else {
            std::fs::remove_file(&entry.path)
        };
        match removed {
            Ok(()) => {
                info!(
                    "Evicting conversion cache entry {} ({} bytes)",
                    entry.path.display(),
                    entry.size
                );
                outcome.evicted += 1;
                outcome.freed_bytes += entry.size;
                outcome.total_bytes = outcome.total_bytes.saturating_sub(entry.size);
            }
            Err(err) => {
                warn!(
                    "Failed to evict cache entry {}: {}",
                    entry.path.display(),
                    err
                );
            }
        }
    }

    debug!(
        "Conversion cache at {} bytes after trim (budget {})",
        outcome.total_bytes, max_bytes
    );
    Ok(outcome)
}

/// Bytes used by a file or directory tree. Unreadable entries count zero.
pub fn entry_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

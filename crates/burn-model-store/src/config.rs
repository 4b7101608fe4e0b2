//! Store configuration
//!
//! Everything path- and budget-shaped the store needs is carried explicitly
//! in a [`StoreConfig`] value. There is no ambient global; callers build one
//! and pass it to the operations that take it.

use std::path::{Path, PathBuf};

use burn_model_convert::GIB;

/// Default conversion cache budget, in gibibytes.
pub const DEFAULT_CONVERSION_CACHE_GIB: u64 = 10;

/// Paths and budgets for one model store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory that relative record paths resolve against.
    pub root_path: PathBuf,
    /// Upper bound on the conversion cache, in bytes.
    pub conversion_cache_bytes: u64,
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(root_path: P) -> Self {
        Self {
            root_path: root_path.into(),
            conversion_cache_bytes: DEFAULT_CONVERSION_CACHE_GIB * GIB,
        }
    }

    /// Override the conversion cache budget. Fractional sizes are fine:
    /// `0.5` is half a gibibyte.
    pub fn with_conversion_cache_gib(mut self, gib: f64) -> Self {
        self.conversion_cache_bytes = (gib * GIB as f64) as u64;
        self
    }

    /// Where converted artifacts are cached.
    pub fn conversion_cache_dir(&self) -> PathBuf {
        self.root_path.join(".convert_cache")
    }

    /// Resolve a record path against the store root. Absolute paths pass
    /// through untouched.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_path.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_budget() {
        let config = StoreConfig::new("/models");
        assert_eq!(config.conversion_cache_bytes, 10 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_fractional_cache_budget() {
        let config = StoreConfig::new("/models").with_conversion_cache_gib(0.5);
        assert_eq!(config.conversion_cache_bytes, 512 * 1024 * 1024);
    }

    #[test]
    fn test_cache_dir_under_root() {
        let config = StoreConfig::new("/models");
        assert_eq!(
            config.conversion_cache_dir(),
            PathBuf::from("/models/.convert_cache")
        );
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let config = StoreConfig::new("/models");
        assert_eq!(
            config.resolve("controlnet/canny.safetensors"),
            PathBuf::from("/models/controlnet/canny.safetensors")
        );
        assert_eq!(
            config.resolve("/elsewhere/canny.safetensors"),
            PathBuf::from("/elsewhere/canny.safetensors")
        );
    }
}

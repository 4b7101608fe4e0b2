//! Weight-file variant selection
//!
//! A packaged directory may carry more than one weight file. Loading walks
//! [`WeightVariant::PRIORITY`] in order and takes the first variant that
//! materializes, so a directory with only the default file still loads and
//! one with both prefers the smaller fp16 file.

use burn_model_convert::schema::{WEIGHTS_FILE, WEIGHTS_FILE_FP16};

/// One candidate weight file inside a packaged directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightVariant {
    /// The half-precision export, preferred when present.
    Fp16,
    /// The unannotated default export.
    Default,
}

impl WeightVariant {
    /// Variants in the order loading tries them.
    pub const PRIORITY: [WeightVariant; 2] = [WeightVariant::Fp16, WeightVariant::Default];

    /// File name this variant uses inside the packaged directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            WeightVariant::Fp16 => WEIGHTS_FILE_FP16,
            WeightVariant::Default => WEIGHTS_FILE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightVariant::Fp16 => "fp16",
            WeightVariant::Default => "default",
        }
    }
}

impl std::fmt::Display for WeightVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

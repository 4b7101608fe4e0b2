//! Precision selection for materialized weights

use safetensors::Dtype;

/// Numeric precision weights are materialized at.
///
/// This is the precision of the tensors handed to the caller, independent of
/// how the weight file stores them; the archive reader converts on the way
/// in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionMode {
    /// Full precision. The safe default.
    #[default]
    Fp32,
    /// Half precision, half the memory.
    Fp16,
    /// bfloat16: f32's exponent range at half the width.
    Bf16,
}

impl PrecisionMode {
    pub fn name(&self) -> &'static str {
        match self {
            PrecisionMode::Fp32 => "fp32",
            PrecisionMode::Fp16 => "fp16",
            PrecisionMode::Bf16 => "bf16",
        }
    }

    /// Bytes one parameter occupies at this precision.
    pub fn bytes_per_param(&self) -> u64 {
        match self {
            PrecisionMode::Fp32 => 4,
            PrecisionMode::Fp16 | PrecisionMode::Bf16 => 2,
        }
    }

    /// The storage dtype tensors are decoded to.
    pub fn dtype(&self) -> Dtype {
        match self {
            PrecisionMode::Fp32 => Dtype::F32,
            PrecisionMode::Fp16 => Dtype::F16,
            PrecisionMode::Bf16 => Dtype::BF16,
        }
    }
}

impl std::fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

//! Error taxonomy for the model store

use std::fmt;
use std::path::PathBuf;

use burn_model_convert::ConvertError;

use crate::types::SubModel;
use crate::variant::WeightVariant;

/// One failed attempt at loading a weight variant.
#[derive(Debug)]
pub struct VariantAttempt {
    pub variant: WeightVariant,
    pub reason: String,
}

/// Every variant attempt made during a load, in the order they were tried.
#[derive(Debug, Default)]
pub struct AttemptList(pub Vec<VariantAttempt>);

impl fmt::Display for AttemptList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", attempt.variant, attempt.reason)?;
        }
        Ok(())
    }
}

/// Errors produced by store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The given model path does not exist
    #[error("model path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    /// The path exists but matches no known model layout
    #[error("no recognized model format at {}", .0.display())]
    InvalidFormat(PathBuf),

    /// The layout was recognized but the contents are not a usable
    /// ControlNet; `reason` is diagnostic only
    #[error("invalid ControlNet model at {}: {reason}", .path.display())]
    InvalidModel { path: PathBuf, reason: String },

    /// ControlNets have no sub-models to hand out
    #[error("ControlNet models have no sub-models (requested {requested})")]
    SubModel { requested: SubModel },

    /// Every weight variant failed; each failure is listed
    #[error("no loadable weights under {}: {attempts}", .dir.display())]
    VariantsExhausted { dir: PathBuf, attempts: AttemptList },

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_list_display() {
        let attempts = AttemptList(vec![
            VariantAttempt {
                variant: WeightVariant::Fp16,
                reason: "file not found".to_string(),
            },
            VariantAttempt {
                variant: WeightVariant::Default,
                reason: "truncated header".to_string(),
            },
        ]);
        assert_eq!(
            attempts.to_string(),
            "fp16: file not found; default: truncated header"
        );
    }

    #[test]
    fn test_variants_exhausted_message_names_every_attempt() {
        let err = StoreError::VariantsExhausted {
            dir: PathBuf::from("/models/canny"),
            attempts: AttemptList(vec![VariantAttempt {
                variant: WeightVariant::Fp16,
                reason: "file not found".to_string(),
            }]),
        };
        let message = err.to_string();
        assert!(message.contains("/models/canny"));
        assert!(message.contains("fp16: file not found"));
    }

    #[test]
    fn test_sub_model_message() {
        let err = StoreError::SubModel {
            requested: SubModel::Vae,
        };
        assert!(err.to_string().contains("vae"));
    }
}

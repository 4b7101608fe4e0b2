//! ControlNet checkpoint probing
//!
//! Works out what kind of network a checkpoint holds from tensor names and
//! shapes alone, so conversion can synthesize a packaged config without a
//! side-channel config file. Probing operates on a plain name-to-shape map
//! rather than an open archive, which keeps it cheap to test.

use std::collections::HashMap;

use crate::schema::NetworkConfig;

/// Tensor names mapped to their shapes, as produced by
/// [`Archive::shapes`](crate::archive::Archive::shapes).
pub type TensorShapes = HashMap<String, Vec<usize>>;

/// Which family of base model a ControlNet was trained against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFlavor {
    Sd1x,
    Sd2x,
    Sdxl,
}

impl NetworkFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkFlavor::Sd1x => "SD 1.x",
            NetworkFlavor::Sd2x => "SD 2.x",
            NetworkFlavor::Sdxl => "SDXL",
        }
    }
}

impl std::fmt::Display for NetworkFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from layout inference
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// A tensor every ControlNet checkpoint carries is missing
    #[error("missing tensor {0}, not a ControlNet checkpoint")]
    MissingTensor(&'static str),

    /// A landmark tensor exists but its shape is not usable
    #[error("unexpected shape {shape:?} for {name}")]
    UnexpectedShape { name: String, shape: Vec<usize> },
}

/// Classify the base-model family a checkpoint targets.
///
/// SDXL nets carry the micro-conditioning embedding (`label_emb`), SD 2.x
/// is recognized by its 1024-wide text context, everything else is SD 1.x.
pub fn detect_flavor(shapes: &TensorShapes) -> NetworkFlavor {
    if contains(shapes, "label_emb.0.0.weight") {
        return NetworkFlavor::Sdxl;
    }
    match context_dim(shapes) {
        Some(2048) => NetworkFlavor::Sdxl,
        Some(1024) => NetworkFlavor::Sd2x,
        _ => NetworkFlavor::Sd1x,
    }
}

/// Infer a packaged config from checkpoint tensor shapes.
///
/// Landmarks used:
/// - `input_hint_block.0.weight` for the conditioning channel count
/// - the first `attn2.to_k` projection for the cross-attention width
/// - the `zero_convs` ladder for the channel progression per level
pub fn infer_config(shapes: &TensorShapes) -> Result<NetworkConfig, ProbeError> {
    const HINT_CONV: &str = "input_hint_block.0.weight";
    let hint = shape(shapes, HINT_CONV).ok_or(ProbeError::MissingTensor(HINT_CONV))?;
    if hint.len() != 4 {
        return Err(ProbeError::UnexpectedShape {
            name: HINT_CONV.to_string(),
            shape: hint.to_vec(),
        });
    }
    let conditioning_channels = hint[1];

    let cross_attention_dim =
        context_dim(shapes).ok_or(ProbeError::MissingTensor("attn2.to_k.weight"))?;

    let zero_convs = zero_conv_channels(shapes);
    if zero_convs.is_empty() {
        return Err(ProbeError::MissingTensor("zero_convs.0.0.weight"));
    }
    let block_out_channels = level_channels(&zero_convs);

    let levels = block_out_channels.len();
    let down_block_types = (0..levels)
        .map(|level| {
            // the first residual block of each level tells us whether the
            // level carries attention
            let has_attention = contains(
                shapes,
                &format!("input_blocks.{}.1.norm.weight", 1 + 3 * level),
            ) || contains(
                shapes,
                &format!("input_blocks.{}.1.proj_in.weight", 1 + 3 * level),
            );
            if has_attention {
                "CrossAttnDownBlock2D".to_string()
            } else {
                "DownBlock2D".to_string()
            }
        })
        .collect();

    Ok(NetworkConfig {
        class_name: crate::schema::CONTROLNET_CLASS.to_string(),
        cross_attention_dim,
        block_out_channels,
        conditioning_channels,
        layers_per_block: 2,
        down_block_types,
        sample_size: None,
    })
}

/// Width of the text context, read off the first cross-attention key
/// projection in name order.
fn context_dim(shapes: &TensorShapes) -> Option<usize> {
    let mut names: Vec<&String> = shapes
        .keys()
        .filter(|name| name.ends_with("attn2.to_k.weight"))
        .collect();
    names.sort();
    let shape = shapes.get(*names.first()?)?;
    match shape.as_slice() {
        [_, context] => Some(*context),
        _ => None,
    }
}

/// Output channels of each `zero_convs` entry, stopping at the first gap.
fn zero_conv_channels(shapes: &TensorShapes) -> Vec<usize> {
    let mut channels = Vec::new();
    for index in 0.. {
        let Some(shape) = shape(shapes, &format!("zero_convs.{index}.0.weight")) else {
            break;
        };
        let Some(&out) = shape.first() else { break };
        channels.push(out);
    }
    channels
}

/// Collapse the per-block channel ladder into one channel count per level.
///
/// Entry 0 belongs to the stem; after that each level contributes three
/// blocks except the last, which has no downsampler.
fn level_channels(zero_convs: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    let mut index = 1;
    while index < zero_convs.len() {
        out.push(zero_convs[index]);
        index += 3;
    }
    if out.is_empty() {
        out.push(zero_convs[0]);
    }
    out
}

/// Shape lookup that tolerates the `control_model.` prefix.
fn shape<'a>(shapes: &'a TensorShapes, name: &str) -> Option<&'a [usize]> {
    if let Some(shape) = shapes.get(name) {
        return Some(shape);
    }
    shapes
        .get(&format!("{}{name}", crate::keymap::prefixes::CONTROL_MODEL))
        .map(Vec::as_slice)
}

fn contains(shapes: &TensorShapes, name: &str) -> bool {
    shape(shapes, name).is_some()
}

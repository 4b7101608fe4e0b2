//! Checkpoint-to-packaged tensor name translation
//!
//! Single-file ControlNet checkpoints use the CompVis naming scheme
//! (`input_blocks.4.1.proj_in.weight`), packaged directories use the
//! diffusers scheme (`down_blocks.1.attentions.0.proj_in.weight`). The
//! translation is purely structural: names change, payloads do not.
//!
//! The down-path arithmetic assumes two residual blocks per level, the
//! layout every SD 1.x, SD 2.x, and SDXL ControlNet released so far uses:
//! each level owns three input blocks (two residual, one downsample),
//! so CompVis index `n` lands in level `(n - 1) / 3`.

/// Well-known name prefixes in ControlNet checkpoints.
pub mod prefixes {
    /// Prefix carried by checkpoints exported with the full wrapper model.
    pub const CONTROL_MODEL: &str = "control_model.";
}

/// Outcome of translating a full set of checkpoint names.
#[derive(Debug, Default)]
pub struct TranslatedKeys {
    /// `(packaged_name, checkpoint_name)` pairs, in input order.
    pub mapped: Vec<(String, String)>,
    /// Checkpoint names with no packaged counterpart.
    pub skipped: Vec<String>,
}

/// Translate every name in `names`, splitting them into mapped and skipped.
pub fn translate_all<'a, I>(names: I) -> TranslatedKeys
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = TranslatedKeys::default();
    for name in names {
        match translate_key(name) {
            Some(target) => out.mapped.push((target, name.to_string())),
            None => out.skipped.push(name.to_string()),
        }
    }
    out
}

/// Translate one checkpoint tensor name to its packaged name.
///
/// Returns `None` for names outside the ControlNet layout; callers decide
/// whether to skip or reject those.
pub fn translate_key(key: &str) -> Option<String> {
    let key = key.strip_prefix(prefixes::CONTROL_MODEL).unwrap_or(key);

    if let Some(rest) = key.strip_prefix("time_embed.0.") {
        return Some(format!("time_embedding.linear_1.{rest}"));
    }
    if let Some(rest) = key.strip_prefix("time_embed.2.") {
        return Some(format!("time_embedding.linear_2.{rest}"));
    }
    // SDXL micro-conditioning embedding
    if let Some(rest) = key.strip_prefix("label_emb.0.0.") {
        return Some(format!("add_embedding.linear_1.{rest}"));
    }
    if let Some(rest) = key.strip_prefix("label_emb.0.2.") {
        return Some(format!("add_embedding.linear_2.{rest}"));
    }
    if let Some(rest) = key.strip_prefix("input_hint_block.") {
        return translate_hint_block(rest);
    }
    if let Some(rest) = key.strip_prefix("zero_convs.") {
        let (index, rest) = split_index(rest)?;
        let rest = rest.strip_prefix("0.")?;
        return Some(format!("controlnet_down_blocks.{index}.{rest}"));
    }
    if let Some(rest) = key.strip_prefix("middle_block_out.0.") {
        return Some(format!("controlnet_mid_block.{rest}"));
    }
    if let Some(rest) = key.strip_prefix("middle_block.") {
        let (index, rest) = split_index(rest)?;
        return match index {
            0 => Some(format!("mid_block.resnets.0.{}", translate_resnet(rest)?)),
            1 => Some(format!("mid_block.attentions.0.{rest}")),
            2 => Some(format!("mid_block.resnets.1.{}", translate_resnet(rest)?)),
            _ => None,
        };
    }
    if let Some(rest) = key.strip_prefix("input_blocks.") {
        let (index, rest) = split_index(rest)?;
        return translate_input_block(index, rest);
    }

    None
}

/// `input_hint_block` interleaves convolutions with activations; only the
/// even indices carry weights.
fn translate_hint_block(rest: &str) -> Option<String> {
    let (index, rest) = split_index(rest)?;
    match index {
        0 => Some(format!("controlnet_cond_embedding.conv_in.{rest}")),
        14 => Some(format!("controlnet_cond_embedding.conv_out.{rest}")),
        n if n % 2 == 0 && n <= 12 => Some(format!(
            "controlnet_cond_embedding.blocks.{}.{rest}",
            n / 2 - 1
        )),
        _ => None,
    }
}

fn translate_input_block(index: usize, rest: &str) -> Option<String> {
    if index == 0 {
        // the stem convolution
        let rest = rest.strip_prefix("0.")?;
        return Some(format!("conv_in.{rest}"));
    }
    if let Some(rest) = rest.strip_prefix("0.op.") {
        if index % 3 != 0 {
            return None;
        }
        let level = index / 3 - 1;
        return Some(format!("down_blocks.{level}.downsamplers.0.conv.{rest}"));
    }
    let level = (index - 1) / 3;
    let slot = (index - 1) % 3;
    if let Some(rest) = rest.strip_prefix("0.") {
        return Some(format!(
            "down_blocks.{level}.resnets.{slot}.{}",
            translate_resnet(rest)?
        ));
    }
    if let Some(rest) = rest.strip_prefix("1.") {
        // transformer names line up 1:1 between the two schemes
        return Some(format!("down_blocks.{level}.attentions.{slot}.{rest}"));
    }
    None
}

/// Rename the layers inside one residual block.
fn translate_resnet(rest: &str) -> Option<String> {
    const RENAMES: [(&str, &str); 6] = [
        ("in_layers.0.", "norm1."),
        ("in_layers.2.", "conv1."),
        ("emb_layers.1.", "time_emb_proj."),
        ("out_layers.0.", "norm2."),
        ("out_layers.3.", "conv2."),
        ("skip_connection.", "conv_shortcut."),
    ];
    for (from, to) in RENAMES {
        if let Some(tail) = rest.strip_prefix(from) {
            return Some(format!("{to}{tail}"));
        }
    }
    None
}

/// Split a leading dotted index off a name: `"3.0.op.weight"` -> `(3, "0.op.weight")`.
fn split_index(s: &str) -> Option<(usize, &str)> {
    let (head, tail) = s.split_once('.')?;
    Some((head.parse().ok()?, tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_control_model_prefix() {
        assert_eq!(
            translate_key("control_model.time_embed.0.weight").as_deref(),
            Some("time_embedding.linear_1.weight")
        );
        assert_eq!(
            translate_key("time_embed.0.weight").as_deref(),
            Some("time_embedding.linear_1.weight")
        );
    }

    #[test]
    fn test_time_and_label_embeddings() {
        assert_eq!(
            translate_key("time_embed.2.bias").as_deref(),
            Some("time_embedding.linear_2.bias")
        );
        assert_eq!(
            translate_key("label_emb.0.0.weight").as_deref(),
            Some("add_embedding.linear_1.weight")
        );
        assert_eq!(
            translate_key("label_emb.0.2.bias").as_deref(),
            Some("add_embedding.linear_2.bias")
        );
    }

    #[test]
    fn test_hint_block_conv_positions() {
        assert_eq!(
            translate_key("input_hint_block.0.weight").as_deref(),
            Some("controlnet_cond_embedding.conv_in.weight")
        );
        assert_eq!(
            translate_key("input_hint_block.2.weight").as_deref(),
            Some("controlnet_cond_embedding.blocks.0.weight")
        );
        assert_eq!(
            translate_key("input_hint_block.12.bias").as_deref(),
            Some("controlnet_cond_embedding.blocks.5.bias")
        );
        assert_eq!(
            translate_key("input_hint_block.14.weight").as_deref(),
            Some("controlnet_cond_embedding.conv_out.weight")
        );
        // odd indices are activations, they carry no tensors
        assert_eq!(translate_key("input_hint_block.1.weight"), None);
    }

    #[test]
    fn test_zero_convs_and_mid_out() {
        assert_eq!(
            translate_key("zero_convs.0.0.weight").as_deref(),
            Some("controlnet_down_blocks.0.weight")
        );
        assert_eq!(
            translate_key("zero_convs.11.0.bias").as_deref(),
            Some("controlnet_down_blocks.11.bias")
        );
        assert_eq!(
            translate_key("middle_block_out.0.weight").as_deref(),
            Some("controlnet_mid_block.weight")
        );
    }

    #[test]
    fn test_stem_and_downsamplers() {
        assert_eq!(
            translate_key("input_blocks.0.0.weight").as_deref(),
            Some("conv_in.weight")
        );
        assert_eq!(
            translate_key("input_blocks.3.0.op.weight").as_deref(),
            Some("down_blocks.0.downsamplers.0.conv.weight")
        );
        assert_eq!(
            translate_key("input_blocks.9.0.op.bias").as_deref(),
            Some("down_blocks.2.downsamplers.0.conv.bias")
        );
    }

    #[test]
    fn test_resnet_layers() {
        assert_eq!(
            translate_key("input_blocks.1.0.in_layers.0.weight").as_deref(),
            Some("down_blocks.0.resnets.0.norm1.weight")
        );
        assert_eq!(
            translate_key("input_blocks.2.0.in_layers.2.weight").as_deref(),
            Some("down_blocks.0.resnets.1.conv1.weight")
        );
        assert_eq!(
            translate_key("input_blocks.4.0.emb_layers.1.bias").as_deref(),
            Some("down_blocks.1.resnets.0.time_emb_proj.bias")
        );
        assert_eq!(
            translate_key("input_blocks.4.0.skip_connection.weight").as_deref(),
            Some("down_blocks.1.resnets.0.conv_shortcut.weight")
        );
        assert_eq!(
            translate_key("input_blocks.8.0.out_layers.3.weight").as_deref(),
            Some("down_blocks.2.resnets.1.conv2.weight")
        );
    }

    #[test]
    fn test_attention_passthrough() {
        assert_eq!(
            translate_key("input_blocks.1.1.transformer_blocks.0.attn2.to_k.weight").as_deref(),
            Some("down_blocks.0.attentions.0.transformer_blocks.0.attn2.to_k.weight")
        );
        assert_eq!(
            translate_key("input_blocks.5.1.proj_out.weight").as_deref(),
            Some("down_blocks.1.attentions.1.proj_out.weight")
        );
    }

    #[test]
    fn test_middle_block() {
        assert_eq!(
            translate_key("middle_block.0.in_layers.2.weight").as_deref(),
            Some("mid_block.resnets.0.conv1.weight")
        );
        assert_eq!(
            translate_key("middle_block.1.transformer_blocks.0.attn1.to_q.weight").as_deref(),
            Some("mid_block.attentions.0.transformer_blocks.0.attn1.to_q.weight")
        );
        assert_eq!(
            translate_key("middle_block.2.out_layers.3.bias").as_deref(),
            Some("mid_block.resnets.1.conv2.bias")
        );
        assert_eq!(translate_key("middle_block.3.weight"), None);
    }

    #[test]
    fn test_unknown_keys_are_none() {
        assert_eq!(translate_key("model.diffusion_model.out.0.weight"), None);
        assert_eq!(translate_key("cond_stage_model.transformer.embeddings"), None);
        assert_eq!(translate_key(""), None);
    }

    #[test]
    fn test_translate_all_partitions() {
        let names = [
            "control_model.time_embed.0.weight",
            "control_model.zero_convs.4.0.bias",
            "something_else.weight",
        ];
        let result = translate_all(names);
        assert_eq!(result.mapped.len(), 2);
        assert_eq!(result.skipped, vec!["something_else.weight".to_string()]);
        assert_eq!(result.mapped[0].0, "time_embedding.linear_1.weight");
        assert_eq!(result.mapped[0].1, "control_model.time_embed.0.weight");
    }
}

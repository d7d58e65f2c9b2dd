//! Template expansion for repeated physical controls
//!
//! A definition with `count: N` stands for N identical controls laid out
//! `midi_add` CCs apart (eight channel faders, eight mute buttons...). Each
//! instance gets a 1-based index appended to its label and substituted for
//! the first `X` in every output address.

use super::{ControlDefinition, OutputBinding, ToggleState, MAX_TEMPLATE_COUNT, MIDI_DATA_MAX};

/// Placeholder replaced by the instance number in output addresses
pub const INDEX_PLACEHOLDER: &str = "X";

/// Expand one definition into its concrete controls
///
/// Definitions without a positive `count` are returned unchanged. At most
/// `MAX_TEMPLATE_COUNT` instances are produced.
pub fn expand_control(control: ControlDefinition) -> Vec<ControlDefinition> {
    match control.template_count {
        Some(count) if count > 0 => (0..count.min(MAX_TEMPLATE_COUNT))
            .map(|idx| instantiate(&control, idx))
            .collect(),
        _ => vec![control],
    }
}

/// Build instance `index` (0-based) of a template
///
/// The CC number is clamped to 0-127; validated configs never hit the clamp.
pub fn instantiate(template: &ControlDefinition, index: u32) -> ControlDefinition {
    let number = index + 1;
    let cc = i64::from(template.control_number) + i64::from(index) * i64::from(template.stride);

    ControlDefinition {
        label: format!("{}{}", template.label, number),
        control_number: cc.clamp(0, i64::from(MIDI_DATA_MAX)) as u8,
        stride: 0,
        template_count: None,
        is_momentary: template.is_momentary,
        outputs: template
            .outputs
            .iter()
            .map(|output| OutputBinding {
                address: substitute_index(&output.address, number),
                ..output.clone()
            })
            .collect(),
        last_toggle: ToggleState::default(),
    }
}

/// Replace the first placeholder in `address` with `number`
pub fn substitute_index(address: &str, number: u32) -> String {
    address.replacen(INDEX_PLACEHOLDER, &number.to_string(), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fader_mutes() -> ControlDefinition {
        ControlDefinition {
            label: "mute".to_string(),
            control_number: 16,
            stride: 1,
            template_count: Some(8),
            is_momentary: true,
            outputs: vec![OutputBinding {
                address: "/ch/X/mute".to_string(),
                toggle: Some([0.0, 1.0]),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_expand_eight_channels() {
        let expanded = expand_control(fader_mutes());

        assert_eq!(expanded.len(), 8);
        for (idx, control) in expanded.iter().enumerate() {
            let n = idx + 1;
            assert_eq!(control.control_number as usize, 16 + idx);
            assert_eq!(control.label, format!("mute{}", n));
            assert_eq!(control.outputs[0].address, format!("/ch/{}/mute", n));
            assert_eq!(control.outputs[0].toggle, Some([0.0, 1.0]));
            assert!(control.is_momentary);
            assert!(!control.is_template());
        }
    }

    #[test]
    fn test_stride_spacing() {
        let template = ControlDefinition {
            label: "solo".to_string(),
            control_number: 32,
            stride: 4,
            template_count: Some(3),
            ..Default::default()
        };

        let ccs: Vec<u8> = expand_control(template)
            .iter()
            .map(|c| c.control_number)
            .collect();
        assert_eq!(ccs, [32, 36, 40]);
    }

    #[test]
    fn test_only_first_placeholder_is_replaced() {
        assert_eq!(substitute_index("/X/mix/X", 3), "/3/mix/X");
        assert_eq!(substitute_index("/master", 3), "/master");
    }

    #[test]
    fn test_zero_count_passes_through() {
        let control = ControlDefinition {
            label: "single".to_string(),
            control_number: 7,
            template_count: Some(0),
            ..Default::default()
        };

        let expanded = expand_control(control);
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].label, "single");
    }

    #[test]
    fn test_instances_do_not_share_toggle_state() {
        let template = fader_mutes();
        template.last_toggle.flip([0.0, 1.0]);

        let first = instantiate(&template, 0);
        let second = instantiate(&template, 1);
        assert_eq!(first.last_toggle.get(), 0.0);

        first.last_toggle.flip([0.0, 1.0]);
        assert_eq!(first.last_toggle.get(), 1.0);
        assert_eq!(second.last_toggle.get(), 0.0);
    }

    #[test]
    fn test_unvalidated_count_is_capped() {
        let template = ControlDefinition {
            template_count: Some(u32::MAX),
            stride: 0,
            ..fader_mutes()
        };

        let expanded = expand_control(template);
        assert_eq!(expanded.len(), MAX_TEMPLATE_COUNT as usize);
    }
}

//! Value transforms applied to a normalized control value

use crate::config::{OutputBinding, ToggleState};

/// Transform selected for one output binding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Linear scaling of the normalized value into `[low, high]`
    Range { low: f32, high: f32 },
    /// Alternate between two states, ignoring the input value
    Toggle([f32; 2]),
    /// Fixed value
    Constant(f32),
    /// Normalized value as-is
    PassThrough,
}

impl Transform {
    /// Pick the transform for a binding
    ///
    /// When several are configured, range wins over toggle and toggle wins
    /// over constant. A binding with none of them passes the value through.
    pub fn for_binding(binding: &OutputBinding) -> Self {
        if let Some([low, high]) = binding.range {
            Transform::Range { low, high }
        } else if let Some(pair) = binding.toggle {
            Transform::Toggle(pair)
        } else if let Some(value) = binding.constant {
            Transform::Constant(value)
        } else {
            Transform::PassThrough
        }
    }

    /// Compute the outbound value
    ///
    /// `state` is the owning control's toggle state; only `Toggle` touches it.
    pub fn apply(&self, normalized: f32, state: &ToggleState) -> f32 {
        match *self {
            Transform::Range { low, high } => low + normalized * (high - low),
            Transform::Toggle(pair) => state.flip(pair),
            Transform::Constant(value) => value,
            Transform::PassThrough => normalized,
        }
    }
}

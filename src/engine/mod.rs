//! Transform engine - maps control changes to outbound OSC messages
//!
//! The engine is a pure function of its inputs plus each control's toggle
//! state. It performs no I/O and never blocks, so it can be driven from any
//! MIDI delivery thread.

pub mod transform;

use tracing::debug;

use crate::config::{ControlDefinition, Encoding, MIDI_DATA_MAX};
pub use transform::Transform;

/// One message ready for the OSC transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub address: String,
    pub encoding: Encoding,
    pub value: f32,
}

/// Convert a 7-bit MIDI value to 0.0-1.0
pub fn normalize(raw_value: u8) -> f32 {
    f32::from(raw_value.min(MIDI_DATA_MAX)) / f32::from(MIDI_DATA_MAX)
}

/// Resolve one control change against `controls`
///
/// The first definition with a matching CC number handles the event; later
/// definitions are never consulted. Unmapped controls yield nothing.
pub fn handle(
    control_number: u8,
    raw_value: u8,
    controls: &[ControlDefinition],
) -> Vec<OutboundMessage> {
    let Some(control) = controls
        .iter()
        .find(|c| c.control_number == control_number)
    else {
        return Vec::new();
    };

    let normalized = normalize(raw_value);

    // Buttons act on release only
    if control.is_momentary && normalized != 0.0 {
        debug!("⏸️  '{}' pressed, waiting for release", control.label);
        return Vec::new();
    }

    control
        .outputs
        .iter()
        .map(|output| OutboundMessage {
            address: output.address.clone(),
            encoding: output.encoding(),
            value: Transform::for_binding(output).apply(normalized, &control.last_toggle),
        })
        .collect()
}

/// Owns the expanded control table
#[derive(Debug, Default)]
pub struct TransformEngine {
    controls: Vec<ControlDefinition>,
}

impl TransformEngine {
    /// Create an engine over already expanded controls
    pub fn new(controls: Vec<ControlDefinition>) -> Self {
        Self { controls }
    }

    pub fn controls(&self) -> &[ControlDefinition] {
        &self.controls
    }

    /// See [`handle`]
    pub fn handle(&self, control_number: u8, raw_value: u8) -> Vec<OutboundMessage> {
        handle(control_number, raw_value, &self.controls)
    }
}

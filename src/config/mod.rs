//! Configuration management for the MIDI to OSC gateway
//!
//! Handles loading, validating and template-expanding the mapping document.
//! The document is read once at startup; after expansion the only mutable
//! piece is each control's toggle state.

mod error;
pub mod template;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::fs;

pub use error::ConfigError;

/// Highest valid MIDI data byte
pub const MIDI_DATA_MAX: u8 = 127;

/// Largest template `count`; there are only 128 CC numbers to spread over
pub const MAX_TEMPLATE_COUNT: u32 = MIDI_DATA_MAX as u32 + 1;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// OSC destination host
    pub server: String,
    /// OSC destination UDP port
    pub port: u16,
    /// Rate limiter timings
    #[serde(default)]
    pub limiter: LimiterConfig,
    /// Substrings selecting which MIDI input ports to open (empty = all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
    /// Control definitions, matched in this order
    pub events: Vec<ControlDefinition>,
}

/// Rate limiter timings
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct LimiterConfig {
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// One logical hardware control
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControlDefinition {
    /// Human readable name
    #[serde(rename = "comment", default)]
    pub label: String,

    /// MIDI CC number this control answers to
    #[serde(rename = "midi")]
    pub control_number: u8,

    /// CC increment between template instances
    #[serde(rename = "midi_add", default, skip_serializing_if = "is_zero")]
    pub stride: i32,

    /// Number of concrete controls this definition expands into
    #[serde(rename = "count", default, skip_serializing_if = "Option::is_none")]
    pub template_count: Option<u32>,

    /// Fire only when the control is released (value 0)
    #[serde(rename = "button", default, skip_serializing_if = "is_false")]
    pub is_momentary: bool,

    /// OSC messages sent for this control, in order
    #[serde(rename = "osc", default)]
    pub outputs: Vec<OutputBinding>,

    /// Last value produced by a toggle output
    #[serde(skip)]
    pub last_toggle: ToggleState,
}

impl ControlDefinition {
    /// True if this definition still needs template expansion
    pub fn is_template(&self) -> bool {
        self.template_count.is_some_and(|n| n > 0)
    }
}

/// One OSC message template attached to a control
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputBinding {
    /// OSC address path
    #[serde(rename = "msg")]
    pub address: String,

    /// Send the value as int32 instead of float32
    #[serde(rename = "int32", default, skip_serializing_if = "is_false")]
    pub encode_as_integer: bool,

    /// Explicit float32 flag; only meaningful when `int32` is not set
    #[serde(rename = "float32", default, skip_serializing_if = "is_false")]
    pub encode_as_float: bool,

    /// Fixed value
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<f32>,

    /// `[low, high]` scaling of the normalized input
    #[serde(rename = "bounds", default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f32; 2]>,

    /// `[stateA, stateB]` alternated on each activation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle: Option<[f32; 2]>,
}

/// Payload type of an outbound OSC argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Int32,
    Float32,
}

impl OutputBinding {
    pub fn encoding(&self) -> Encoding {
        if self.encode_as_integer {
            Encoding::Int32
        } else {
            Encoding::Float32
        }
    }
}

/// Per-control toggle value shared by every delivery thread
///
/// Stored as the raw bits of an `f32` so reads and flips are single atomic
/// operations.
#[derive(Debug, Default)]
pub struct ToggleState(AtomicU32);

impl ToggleState {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    /// Current value
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Flip between the two states and return the new one
    ///
    /// If the current value equals `pair[0]` the new value is `pair[1]`,
    /// otherwise it is `pair[0]`.
    pub fn flip(&self, pair: [f32; 2]) -> f32 {
        let [a, b] = pair;
        let mut next = a;
        // The closure never returns None, so the update always succeeds.
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                next = if f32::from_bits(bits) == a { b } else { a };
                Some(next.to_bits())
            });
        next
    }
}

impl Clone for ToggleState {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl Config {
    /// Load configuration from file with validation
    ///
    /// `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml(&bytes)
        } else {
            Self::from_json(&bytes)
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace every template definition by its concrete instances
    ///
    /// Expanded children take the template's position; all other definitions
    /// keep their order. Running this on an already expanded config is a no-op.
    pub fn expand(self) -> Self {
        let events = self
            .events
            .into_iter()
            .flat_map(template::expand_control)
            .collect();

        Self { events, ..self }
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.trim().is_empty() {
            return Err(ConfigError::EmptyServer);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        for (idx, control) in self.events.iter().enumerate() {
            let name = if control.label.is_empty() {
                format!("#{}", idx)
            } else {
                control.label.clone()
            };
            validate_control(&name, control)?;
        }

        Ok(())
    }
}

/// Validate a single control definition
fn validate_control(name: &str, control: &ControlDefinition) -> Result<(), ConfigError> {
    if control.control_number > MIDI_DATA_MAX {
        return Err(ConfigError::invalid(
            name,
            format!(
                "MIDI CC {} is out of range (must be 0-127)",
                control.control_number
            ),
        ));
    }

    if let Some(count) = control.template_count.filter(|n| *n > 0) {
        if count > MAX_TEMPLATE_COUNT {
            return Err(ConfigError::invalid(
                name,
                format!(
                    "template count {} exceeds {} (one per CC number)",
                    count, MAX_TEMPLATE_COUNT
                ),
            ));
        }
        let last = i64::from(control.control_number)
            + i64::from(count - 1) * i64::from(control.stride);
        if !(0..=i64::from(MIDI_DATA_MAX)).contains(&last) {
            return Err(ConfigError::invalid(
                name,
                format!(
                    "template of {} controls with midi_add {} reaches CC {} (must stay within 0-127)",
                    count, control.stride, last
                ),
            ));
        }
    }

    for output in &control.outputs {
        if output.address.is_empty() {
            return Err(ConfigError::invalid(name, "OSC address cannot be empty"));
        }
        if !output.address.starts_with('/') {
            return Err(ConfigError::invalid(
                name,
                format!("OSC address '{}' must start with '/'", output.address),
            ));
        }
        let numbers = output
            .range
            .iter()
            .chain(output.toggle.iter())
            .flatten()
            .chain(output.constant.iter());
        for value in numbers {
            if !value.is_finite() {
                return Err(ConfigError::invalid(
                    name,
                    format!("non-finite value in output '{}'", output.address),
                ));
            }
        }
    }

    Ok(())
}

// Default value functions
fn default_min_interval_ms() -> u64 { 50 }
fn default_cooldown_ms() -> u64 { 500 }
fn is_zero(value: &i32) -> bool { *value == 0 }
fn is_false(value: &bool) -> bool { !*value }

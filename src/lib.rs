//! MIDI to OSC gateway
//!
//! Turns control-change messages from hardware MIDI controllers into OSC
//! messages, using a declarative mapping table with range, toggle and
//! constant transforms and a rate limiter in front of the network link.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod input;
pub mod limiter;
pub mod midi;
pub mod osc;

pub use config::{Config, ConfigError, ControlDefinition, Encoding, OutputBinding};
pub use dispatch::{DispatchOutcome, SourceListener};
pub use engine::{OutboundMessage, TransformEngine};
pub use limiter::RateLimiter;
pub use osc::{ConsoleSender, OscSender, UdpOscSender};

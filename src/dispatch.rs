//! Event dispatch - the per-source entry point for raw MIDI
//!
//! Each opened input port gets its own [`SourceListener`]. Listeners share
//! the transform engine, the rate limiter and the OSC sender through `Arc`s,
//! and run on whatever thread the MIDI driver delivers on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, trace};

use crate::engine::TransformEngine;
use crate::limiter::RateLimiter;
use crate::midi::{format_hex, RawEvent};
use crate::osc::OscSender;

/// What happened to one raw MIDI message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a 3-byte message
    Ignored,
    /// Dropped by the intake gate
    Throttled,
    /// Processed; counts of messages produced and actually sent
    Processed { produced: usize, sent: usize },
}

/// Listener state for one MIDI input source
pub struct SourceListener {
    name: String,
    engine: Arc<TransformEngine>,
    limiter: Arc<RateLimiter>,
    sender: Arc<dyn OscSender>,
}

impl SourceListener {
    pub fn new(
        name: impl Into<String>,
        engine: Arc<TransformEngine>,
        limiter: Arc<RateLimiter>,
        sender: Arc<dyn OscSender>,
    ) -> Self {
        Self {
            name: name.into(),
            engine,
            limiter,
            sender,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver callback entry point
    ///
    /// Panics are contained here so one misbehaving source cannot take the
    /// others down. After a successful send this thread sleeps for the
    /// limiter cooldown.
    pub fn on_midi(&self, data: &[u8]) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatch_at(Instant::now(), data)
        }));

        match outcome {
            Ok(DispatchOutcome::Processed { sent, .. }) if sent > 0 => {
                let cooldown = self.limiter.cooldown();
                if !cooldown.is_zero() {
                    trace!("💤 '{}' cooling down for {:?}", self.name, cooldown);
                    thread::sleep(cooldown);
                }
            }
            Ok(_) => {}
            Err(_) => error!(
                "💥 Panic while handling MIDI from '{}' ({}), event dropped",
                self.name,
                format_hex(data)
            ),
        }
    }

    /// Process one raw message as if it arrived at `now`, without sleeping
    pub fn dispatch_at(&self, now: Instant, data: &[u8]) -> DispatchOutcome {
        let Some(event) = RawEvent::decode(data) else {
            trace!("'{}' ignoring malformed message: {}", self.name, format_hex(data));
            return DispatchOutcome::Ignored;
        };
        trace!("🎹 {} <- {}", self.name, event);

        if !self.limiter.admit(now) {
            trace!("'{}' intake throttled: {}", self.name, event);
            return DispatchOutcome::Throttled;
        }

        let messages = self.engine.handle(event.control, event.value);
        let produced = messages.len();
        let mut sent = 0;

        for message in &messages {
            match self
                .limiter
                .send_gated(now, || self.sender.send(message))
            {
                Ok(true) => {
                    sent += 1;
                    debug!(
                        "📤 {} -> {} {} = {}",
                        self.name,
                        self.sender.name(),
                        message.address,
                        message.value
                    );
                }
                Ok(false) => debug!("⏳ Send throttled: {} = {}", message.address, message.value),
                Err(e) => error!("❌ Failed to send {}: {:#}", message.address, e),
            }
        }

        DispatchOutcome::Processed { produced, sent }
    }
}

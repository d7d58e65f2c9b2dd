//! OSC output - encodes outbound messages and ships them over UDP
//!
//! Transport is connectionless: one datagram per message, no acknowledgement.

use anyhow::{anyhow, Context, Result};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, trace};

use crate::config::Encoding;
use crate::engine::OutboundMessage;

/// Sink for outbound OSC messages
///
/// Implementations are called from MIDI driver threads and must be shareable.
pub trait OscSender: Send + Sync {
    /// Destination description for logs
    fn name(&self) -> &str;

    /// Send one message
    fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Build the rosc message for an outbound message
///
/// Int32 payloads truncate toward zero and saturate at the i32 limits.
pub fn to_osc_message(message: &OutboundMessage) -> OscMessage {
    let arg = match message.encoding {
        Encoding::Int32 => OscType::Int(message.value as i32),
        Encoding::Float32 => OscType::Float(message.value),
    };

    OscMessage {
        addr: message.address.clone(),
        args: vec![arg],
    }
}

/// Encode an outbound message into an OSC datagram
pub fn encode(message: &OutboundMessage) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(to_osc_message(message));
    encoder::encode(&packet)
        .map_err(|e| anyhow!("Failed to encode OSC message {}: {:?}", message.address, e))
}

/// UDP sender bound to an ephemeral local port
pub struct UdpOscSender {
    name: String,
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpOscSender {
    /// Resolve `server:port` and bind a local socket of the matching family
    pub fn connect(server: &str, port: u16) -> Result<Self> {
        let target = (server, port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve OSC server {}:{}", server, port))?
            .next()
            .ok_or_else(|| anyhow!("OSC server {}:{} resolved to no address", server, port))?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(bind_addr)
            .with_context(|| format!("Failed to bind UDP socket on {}", bind_addr))?;

        info!("📡 OSC client ready: {} -> {}", socket.local_addr()?, target);

        Ok(Self {
            name: format!("udp:{}", target),
            socket,
            target,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl OscSender for UdpOscSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: &OutboundMessage) -> Result<()> {
        let buf = encode(message)?;
        self.socket
            .send_to(&buf, self.target)
            .with_context(|| format!("Failed to send {} to {}", message.address, self.target))?;
        trace!("📤 {} -> {} ({} bytes)", message.address, self.target, buf.len());
        Ok(())
    }
}

/// Sender that only logs, for running without a receiver
pub struct ConsoleSender {
    name: String,
    /// Execution counter for debugging
    sent_count: AtomicU64,
}

impl ConsoleSender {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent_count: AtomicU64::new(0),
        }
    }

    pub fn sent_count(&self) -> u64 {
        self.sent_count.load(Ordering::Relaxed)
    }
}

impl OscSender for ConsoleSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: &OutboundMessage) -> Result<()> {
        // Encode anyway so dry runs catch the same errors as the real link
        encode(message)?;
        let n = self.sent_count.fetch_add(1, Ordering::Relaxed) + 1;
        let value = match message.encoding {
            Encoding::Int32 => format!("i:{}", message.value as i32),
            Encoding::Float32 => format!("f:{}", message.value),
        };
        info!("🖨️  [{}#{}] {} {}", self.name, n, message.address, value);
        Ok(())
    }
}

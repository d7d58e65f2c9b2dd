//! MIDI input - opens controller ports and attaches a listener to each
//!
//! Every port is opened independently: a port that fails to open is logged
//! and skipped, the others keep working.

use anyhow::{anyhow, Result};
use midir::{MidiInput, MidiInputConnection};
use tracing::{debug, error, info, warn};

use crate::dispatch::SourceListener;
use crate::midi::discovery::{self, PortInfo};
use crate::midi::port_matches;

/// Client name announced to the MIDI subsystem
const CLIENT_NAME: &str = "midi-osc-gw";

/// Open input connections; dropping the hub closes them
pub struct InputHub {
    connections: Vec<(String, MidiInputConnection<()>)>,
}

impl InputHub {
    /// Open every input port matching `patterns` (all ports if empty)
    ///
    /// `make_listener` is called once per port with the port name, before the
    /// port is opened. Fails only if the MIDI subsystem cannot enumerate
    /// ports at all.
    pub fn open<F>(patterns: &[String], mut make_listener: F) -> Result<Self>
    where
        F: FnMut(&str) -> SourceListener,
    {
        let ports = discovery::discover_input_ports()?;
        debug!("MIDI input ports: {:?}", ports);

        let mut connections = Vec::new();
        for port in select_ports(&ports, patterns) {
            info!("🔌 Setting up '{}'", port.name);
            let listener = make_listener(&port.name);
            match open_port(port, listener) {
                Ok(connection) => {
                    info!("✅ Listening on '{}'", port.name);
                    connections.push((port.name.clone(), connection));
                }
                Err(e) => error!("❌ Failed to open '{}': {:#}", port.name, e),
            }
        }

        if connections.is_empty() {
            warn!("⚠️  No MIDI input ports opened");
        }

        Ok(Self { connections })
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.connections.iter().map(|(name, _)| name.as_str())
    }

    /// Close all connections
    pub fn close(self) {
        for (name, connection) in self.connections {
            connection.close();
            debug!("Closed '{}'", name);
        }
    }
}

/// Ports to open, in enumeration order
pub fn select_ports<'a>(ports: &'a [PortInfo], patterns: &[String]) -> Vec<&'a PortInfo> {
    ports
        .iter()
        .filter(|port| port_matches(&port.name, patterns))
        .collect()
}

/// Open one port and route its messages to `listener`
fn open_port(info: &PortInfo, listener: SourceListener) -> Result<MidiInputConnection<()>> {
    let midi_in = MidiInput::new(&format!("{}-{}", CLIENT_NAME, info.index))?;

    // Indices can shift if devices are hot-plugged between discovery and here
    let port = midi_in
        .ports()
        .into_iter()
        .nth(info.index)
        .filter(|port| midi_in.port_name(port).ok().as_deref() == Some(info.name.as_str()))
        .ok_or_else(|| anyhow!("Port '{}' disappeared", info.name))?;

    midi_in
        .connect(
            &port,
            CLIENT_NAME,
            move |_timestamp_us, data, _| listener.on_midi(data),
            (),
        )
        .map_err(|e| anyhow!("Failed to connect to '{}': {}", info.name, e))
}

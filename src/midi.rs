//! MIDI utilities
//!
//! Raw event decoding, human readable formatting for logs, and input port
//! discovery.

use anyhow::Result;
use midir::MidiInput;
use std::fmt;

/// A raw three-byte channel message as delivered by the driver
///
/// Only the data bytes matter for mapping; the status byte is kept for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub status: u8,
    pub control: u8,
    pub value: u8,
}

impl RawEvent {
    /// Decode a driver message
    ///
    /// Anything not exactly 3 bytes, or with a data byte above 0x7F, is
    /// rejected.
    pub fn decode(data: &[u8]) -> Option<Self> {
        match *data {
            [status, control, value] if control <= 0x7F && value <= 0x7F => Some(Self {
                status,
                control,
                value,
            }),
            _ => None,
        }
    }

    /// Channel 1-16 for channel messages
    pub fn channel(&self) -> Option<u8> {
        (0x80..0xF0)
            .contains(&self.status)
            .then_some((self.status & 0x0F) + 1)
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_status(self.status)
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel() {
            Some(ch) => write!(
                f,
                "{} ch:{} #{} v:{}",
                self.kind(),
                ch,
                self.control,
                self.value
            ),
            None => write!(f, "{} #{} v:{}", self.kind(), self.control, self.value),
        }
    }
}

/// Message type encoded in the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    NoteOff,
    NoteOn,
    PolyPressure,
    ControlChange,
    PitchBend,
    Other,
}

impl MessageKind {
    pub fn from_status(status: u8) -> Self {
        match status & 0xF0 {
            0x80 => MessageKind::NoteOff,
            0x90 => MessageKind::NoteOn,
            0xA0 => MessageKind::PolyPressure,
            0xB0 => MessageKind::ControlChange,
            0xE0 => MessageKind::PitchBend,
            _ => MessageKind::Other,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::NoteOff => "NoteOff",
            MessageKind::NoteOn => "NoteOn",
            MessageKind::PolyPressure => "PolyPressure",
            MessageKind::ControlChange => "CC",
            MessageKind::PitchBend => "PitchBend",
            MessageKind::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive substring match against any pattern; no patterns match all
pub fn port_matches(name: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let name = name.to_lowercase();
    patterns
        .iter()
        .any(|pattern| name.contains(&pattern.to_lowercase()))
}

/// Port discovery utilities
pub mod discovery {
    use super::*;

    /// Information about a MIDI input port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
        pub is_virtual: bool,
    }

    /// Heuristic for loopback/virtual ports
    pub fn is_virtual_port(name: &str) -> bool {
        name.contains("Virtual")
            || name.contains("loopMIDI")
            || name.contains("IAC")
            || name.contains("Midi Through")
    }

    /// Discover input ports
    pub fn discover_input_ports() -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new("midi-osc-gw-discovery")?;

        let mut port_infos = Vec::new();
        for (index, port) in midi_in.ports().iter().enumerate() {
            match midi_in.port_name(port) {
                Ok(name) => port_infos.push(PortInfo {
                    index,
                    is_virtual: is_virtual_port(&name),
                    name,
                }),
                Err(e) => tracing::warn!("Skipping input port {}: {}", index, e),
            }
        }

        Ok(port_infos)
    }

    /// Print discovered ports
    pub fn print_ports() {
        println!("\n=== MIDI Input Ports ===");
        match discover_input_ports() {
            Ok(ports) if ports.is_empty() => println!("  (none)"),
            Ok(ports) => {
                for port in ports {
                    let virtual_tag = if port.is_virtual { " [VIRTUAL]" } else { "" };
                    println!("  {}: {}{}", port.index, port.name, virtual_tag);
                }
            }
            Err(e) => println!("  Failed to enumerate ports: {}", e),
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_control_change() {
        let event = RawEvent::decode(&[0xB2, 7, 100]).unwrap();

        assert_eq!(
            event,
            RawEvent {
                status: 0xB2,
                control: 7,
                value: 100,
            }
        );
        assert_eq!(event.channel(), Some(3));
        assert_eq!(event.kind(), MessageKind::ControlChange);
        assert_eq!(event.to_string(), "CC ch:3 #7 v:100");
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert_eq!(RawEvent::decode(&[]), None);
        assert_eq!(RawEvent::decode(&[0xC0, 5]), None);
        assert_eq!(RawEvent::decode(&[0xF0, 0x00, 0x20, 0xF7]), None);
    }

    #[test]
    fn test_decode_rejects_malformed_data_bytes() {
        assert_eq!(RawEvent::decode(&[0xB0, 0x85, 0x40]), None);
        assert_eq!(RawEvent::decode(&[0xB0, 0x05, 0xFF]), None);

        let event = RawEvent::decode(&[0xB0, 0x7F, 0x7F]).unwrap();
        assert_eq!(event.control, 127);
        assert_eq!(event.value, 127);
    }

    #[test]
    fn test_system_status_has_no_channel() {
        let event = RawEvent::decode(&[0xF2, 0, 0]).unwrap();
        assert_eq!(event.channel(), None);
        assert_eq!(event.kind(), MessageKind::Other);
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xB0, 0x10, 0x7F]), "B0 10 7F");
    }

    #[test]
    fn test_port_matches() {
        let patterns = vec!["nanoKONTROL".to_string()];
        assert!(port_matches("nanoKONTROL2 SLIDER/KNOB", &patterns));
        assert!(port_matches("NANOKONTROL2", &patterns));
        assert!(!port_matches("X-Touch", &patterns));
        assert!(port_matches("anything", &[]));
    }

    #[test]
    fn test_virtual_port_heuristic() {
        assert!(discovery::is_virtual_port("loopMIDI Port 1"));
        assert!(discovery::is_virtual_port("Midi Through Port-0"));
        assert!(!discovery::is_virtual_port("nanoKONTROL2"));
    }

    #[test]
    fn test_port_discovery() {
        // Only checks that enumeration does not panic without hardware
        let _ = discovery::discover_input_ports();
    }
}

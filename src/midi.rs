//! MIDI message types used on the Ohm64 wire
//!
//! Only the handful of messages the surface speaks: notes for buttons and
//! per-button LEDs, CC for the faders/knobs we pass over, and system
//! exclusive for the LED matrix frames.

use std::fmt;

/// MIDI message types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// System Exclusive: bytes between the 0xF0/0xF7 markers
    SysEx { data: Vec<u8> },
}

impl MidiMessage {
    /// Per-button LED update. The Ohm64 wants `0x90 id 0|1`, so "off" is
    /// still a NoteOn with velocity 0.
    pub fn button_led(channel: u8, id: u8, on: bool) -> Self {
        MidiMessage::NoteOn {
            channel,
            note: id,
            velocity: u8::from(on),
        }
    }

    /// Parse a MIDI message from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;

        // Running status is never used by the Ohm64
        if status < 0x80 {
            return None;
        }

        if status == 0xF0 {
            let end = rest.iter().position(|&b| b == 0xF7)?;
            return Some(MidiMessage::SysEx {
                data: rest[..end].to_vec(),
            });
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 if rest.len() >= 2 => Some(MidiMessage::NoteOff {
                channel,
                note: rest[0] & 0x7F,
                velocity: rest[1] & 0x7F,
            }),
            0x90 if rest.len() >= 2 => {
                let note = rest[0] & 0x7F;
                let velocity = rest[1] & 0x7F;

                // Note On with velocity 0 = Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xB0 if rest.len() >= 2 => Some(MidiMessage::ControlChange {
                channel,
                cc: rest[0] & 0x7F,
                value: rest[1] & 0x7F,
            }),
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::SysEx { ref data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(0xF0);
                result.extend_from_slice(data);
                result.push(0xF7);
                result
            }
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::SysEx { ref data } => {
                write!(f, "SysEx {} bytes", data.len())
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

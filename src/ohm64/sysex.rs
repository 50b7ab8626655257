//! LED matrix sysex frames
//!
//! Sync frame: `F0 00 01 61 02 04 (LL HH) x 6 F7`. Each LL/HH byte packs the
//! seven slots of one column half, slot 0 (or 7) in bit 0.

use serde::{Deserialize, Serialize};

use super::layout::{BUTTON_COUNT, COLUMNS, INDEX_MAP, SLOTS_PER_HALF};
use crate::error::{Result, SurfaceError};
use crate::midi::MidiMessage;

/// Header of the LED-sync frame (Livid manufacturer id, Ohm64, "set LEDs")
pub const SYNC_HEADER: [u8; 6] = [0xF0, 0x00, 0x01, 0x61, 0x02, 0x04];

/// Complete factory-reset frame
pub const FACTORY_RESET: [u8; 7] = [0xF0, 0x00, 0x01, 0x61, 0x02, 0x06, 0xF7];

/// End of exclusive
pub const SYSEX_END: u8 = 0xF7;

/// Header + 12 payload bytes + terminator
pub const SYNC_FRAME_LEN: usize = SYNC_HEADER.len() + COLUMNS * 2 + 1;

/// Bit sense of the LED matrix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Bit set = LED on
    #[default]
    Normal,
    /// Bit set = LED off
    Inverted,
}

/// A complete sysex frame, markers included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexFrame {
    bytes: Vec<u8>,
}

impl SysexFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Wrap as a single MIDI message so the transport sends it in one packet
    pub fn into_message(self) -> MidiMessage {
        let mut data = self.bytes;
        data.pop();
        data.remove(0);
        MidiMessage::SysEx { data }
    }
}

/// Encodes board state into LED frames and back
#[derive(Debug, Clone, Copy, Default)]
pub struct SysexEncoder {
    polarity: Polarity,
}

impl SysexEncoder {
    pub fn new(polarity: Polarity) -> Self {
        Self { polarity }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn set_polarity(&mut self, polarity: Polarity) {
        self.polarity = polarity;
    }

    fn bit_for(&self, on: bool) -> bool {
        match self.polarity {
            Polarity::Normal => on,
            Polarity::Inverted => !on,
        }
    }

    /// LL and HH bytes of one scan column
    pub fn column_checksum(&self, states: &[bool; BUTTON_COUNT], column: usize) -> (u8, u8) {
        let Some(slots) = INDEX_MAP.get(column) else {
            return (0, 0);
        };

        let mut halves = [0u8; 2];
        for (slot, entry) in slots.iter().enumerate() {
            let Some(id) = *entry else { continue };
            if self.bit_for(states[id as usize]) {
                // exponent restarts at the LL/HH boundary
                halves[slot / SLOTS_PER_HALF] |= 1 << (slot % SLOTS_PER_HALF);
            }
        }

        (halves[0], halves[1])
    }

    /// Full LED-sync frame for the given states
    pub fn sync(&self, states: &[bool; BUTTON_COUNT]) -> SysexFrame {
        let mut bytes = Vec::with_capacity(SYNC_FRAME_LEN);
        bytes.extend_from_slice(&SYNC_HEADER);
        for column in 0..COLUMNS {
            let (ll, hh) = self.column_checksum(states, column);
            bytes.push(ll);
            bytes.push(hh);
        }
        bytes.push(SYSEX_END);

        SysexFrame { bytes }
    }

    pub fn factory_reset() -> SysexFrame {
        SysexFrame {
            bytes: FACTORY_RESET.to_vec(),
        }
    }

    /// Recover button states from a sync frame. Padding bits are ignored.
    pub fn decode_sync(&self, bytes: &[u8]) -> Result<[bool; BUTTON_COUNT]> {
        if bytes.len() != SYNC_FRAME_LEN {
            return Err(SurfaceError::MalformedFrame(format!(
                "expected {} bytes, got {}",
                SYNC_FRAME_LEN,
                bytes.len()
            )));
        }
        if !bytes.starts_with(&SYNC_HEADER) {
            return Err(SurfaceError::MalformedFrame(
                "not an LED-sync header".to_string(),
            ));
        }
        if bytes[SYNC_FRAME_LEN - 1] != SYSEX_END {
            return Err(SurfaceError::MalformedFrame(
                "missing end of exclusive".to_string(),
            ));
        }

        let payload = &bytes[SYNC_HEADER.len()..SYNC_FRAME_LEN - 1];
        if let Some(bad) = payload.iter().find(|b| **b > 0x7F) {
            return Err(SurfaceError::MalformedFrame(format!(
                "payload byte {:#04X} is not 7-bit",
                bad
            )));
        }

        let mut states = [false; BUTTON_COUNT];
        for (column, pair) in payload.chunks_exact(2).enumerate() {
            for (slot, entry) in INDEX_MAP[column].iter().enumerate() {
                let Some(id) = *entry else { continue };
                let bit = (pair[slot / SLOTS_PER_HALF] >> (slot % SLOTS_PER_HALF)) & 1 == 1;
                states[id as usize] = self.bit_for(bit);
            }
        }

        Ok(states)
    }
}

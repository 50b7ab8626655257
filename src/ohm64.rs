//! Livid Ohm64 driver
//!
//! Handles MIDI communication with the Ohm64 control surface.

pub mod layout;
pub mod sysex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::config::AppConfig;
use crate::midi::{format_hex, MidiMessage};
use crate::transport::Transport;

/// MIDI event from the Ohm64
#[derive(Debug, Clone)]
pub struct Ohm64Event {
    pub message: MidiMessage,
    pub raw_data: Vec<u8>,
}

/// A grid button going down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub id: u8,
    pub pressed: bool,
}

impl Ohm64Event {
    /// Interpret the event as a grid button press on `channel`.
    ///
    /// Note numbers are passed through unchecked; the surface rejects ids
    /// outside the grid.
    pub fn button_press(&self, channel: u8) -> Option<ButtonPress> {
        match self.message {
            MidiMessage::NoteOn { channel: ch, note, velocity } if ch == channel => {
                Some(ButtonPress {
                    id: note,
                    pressed: velocity > 0,
                })
            }
            MidiMessage::NoteOff { channel: ch, note, .. } if ch == channel => Some(ButtonPress {
                id: note,
                pressed: false,
            }),
            _ => None,
        }
    }
}

/// Shared handle on the Ohm64 output port
#[derive(Clone)]
pub struct Ohm64Output {
    conn: Arc<Mutex<MidiOutputConnection>>,
}

impl Ohm64Output {
    /// Send raw MIDI bytes in a single packet
    pub fn send_raw(&self, data: &[u8]) -> Result<()> {
        self.conn
            .lock()
            .send(data)
            .context("Failed to send MIDI data")?;

        debug!("Sent: {}", format_hex(data));
        Ok(())
    }
}

#[async_trait]
impl Transport for Ohm64Output {
    async fn send(&self, message: &MidiMessage) -> Result<()> {
        self.send_raw(&message.encode())
    }
}

/// Ohm64 driver for hardware communication
pub struct Ohm64Driver {
    /// MIDI input connection
    input_conn: Option<MidiInputConnection<()>>,

    /// MIDI output connection
    output_conn: Option<Ohm64Output>,

    /// Event sender for incoming MIDI
    event_tx: mpsc::Sender<Ohm64Event>,

    /// Event receiver
    event_rx: Option<mpsc::Receiver<Ohm64Event>>,

    /// Input port name pattern
    input_port_name: String,

    /// Output port name pattern
    output_port_name: String,
}

impl Ohm64Driver {
    pub fn new(config: &AppConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1000);

        Self {
            input_conn: None,
            output_conn: None,
            event_tx,
            event_rx: Some(event_rx),
            input_port_name: config.midi.input_port.clone(),
            output_port_name: config.midi.output_port.clone(),
        }
    }

    /// Find an input port by case-insensitive substring match
    fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(midir::MidiInputPort, String)> {
        let pattern = pattern.to_lowercase();
        midi_in.ports().into_iter().find_map(|port| {
            let name = midi_in.port_name(&port).ok()?;
            if name.to_lowercase().contains(&pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                Some((port, name))
            } else {
                None
            }
        })
    }

    /// Find an output port by case-insensitive substring match
    fn find_output_port(
        midi_out: &MidiOutput,
        pattern: &str,
    ) -> Option<(midir::MidiOutputPort, String)> {
        let pattern = pattern.to_lowercase();
        midi_out.ports().into_iter().find_map(|port| {
            let name = midi_out.port_name(&port).ok()?;
            if name.to_lowercase().contains(&pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                Some((port, name))
            } else {
                None
            }
        })
    }

    /// Connect to the Ohm64 MIDI ports
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        info!(
            "Connecting to Ohm64 - Input: '{}', Output: '{}'",
            self.input_port_name, self.output_port_name
        );

        let midi_in = MidiInput::new("Ohm64-GW-Input").context("Failed to create MIDI input")?;
        debug!("Found {} MIDI input ports", midi_in.port_count());

        let (in_port, port_name) = Self::find_input_port(&midi_in, &self.input_port_name)
            .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", self.input_port_name))?;

        info!("Connecting to input port: {}", port_name);

        let event_tx = self.event_tx.clone();
        let input_conn = midi_in
            .connect(
                &in_port,
                "Ohm64-GW",
                move |_timestamp, data, _| {
                    if let Some(message) = MidiMessage::parse(data) {
                        let event = Ohm64Event {
                            message,
                            raw_data: data.to_vec(),
                        };

                        // Never block the MIDI callback thread
                        let _ = event_tx.try_send(event);
                    } else {
                        trace!("Ignoring unparsed MIDI: {}", format_hex(data));
                    }
                },
                (),
            )
            .map_err(|e| anyhow::anyhow!("Failed to connect to input port: {}", e))?;

        self.input_conn = Some(input_conn);

        let midi_out =
            MidiOutput::new("Ohm64-GW-Output").context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (out_port, port_name) = Self::find_output_port(&midi_out, &self.output_port_name)
            .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", self.output_port_name))?;

        info!("Connecting to output port: {}", port_name);

        let output_conn = midi_out
            .connect(&out_port, "Ohm64-GW")
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port: {}", e))?;

        self.output_conn = Some(Ohm64Output {
            conn: Arc::new(Mutex::new(output_conn)),
        });

        info!("Ohm64 connected");
        Ok(())
    }

    /// Disconnect from MIDI ports
    pub fn disconnect(&mut self) {
        if self.is_connected() {
            info!("Ohm64 disconnected");
        }
        self.input_conn = None;
        self.output_conn = None;
    }

    pub fn is_connected(&self) -> bool {
        self.input_conn.is_some() && self.output_conn.is_some()
    }

    /// Output handle for the transport pump
    pub fn output(&self) -> Result<Ohm64Output> {
        self.output_conn
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Not connected to output port"))
    }

    /// Take the event receiver (for the main loop to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<Ohm64Event>> {
        self.event_rx.take()
    }
}

/// Port discovery utilities
pub mod discovery {
    use super::*;

    /// Port name fragments the Ohm64 shows up under
    const OHM64_PATTERNS: [&str; 3] = ["Ohm64", "OHM64", "Livid"];

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
        pub is_virtual: bool,
    }

    fn is_virtual(name: &str) -> bool {
        name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC")
    }

    /// Discover input ports
    pub fn discover_input_ports() -> Result<Vec<PortInfo>> {
        let midi_in = MidiInput::new("Ohm64-GW-Discovery")?;

        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_in.port_name(port).ok()?;
                Some(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    /// Discover output ports
    pub fn discover_output_ports() -> Result<Vec<PortInfo>> {
        let midi_out = MidiOutput::new("Ohm64-GW-Discovery")?;

        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_out.port_name(port).ok()?;
                Some(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    /// Pick the first physical input/output pair that looks like an Ohm64
    pub fn match_ohm64_ports(inputs: &[PortInfo], outputs: &[PortInfo]) -> Option<(String, String)> {
        OHM64_PATTERNS.iter().find_map(|pattern| {
            let input = inputs
                .iter()
                .find(|p| p.name.contains(pattern) && !p.is_virtual)?;
            let output = outputs
                .iter()
                .find(|p| p.name.contains(pattern) && !p.is_virtual)?;
            Some((input.name.clone(), output.name.clone()))
        })
    }

    /// Find Ohm64 ports automatically
    pub fn find_ohm64_ports() -> Option<(String, String)> {
        let inputs = discover_input_ports().ok()?;
        let outputs = discover_output_ports().ok()?;
        match_ohm64_ports(&inputs, &outputs)
    }
}

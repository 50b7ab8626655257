//! MIDI sniffer for debugging and development
//!
//! Prints everything arriving on an input port. LED-sync frames are decoded
//! back to the 8x8 grid, which makes it easy to point the sniffer at a
//! loopback port and check what a host is sending the Ohm64.

use anyhow::{bail, Result};
use colored::*;
use midir::{MidiInput, MidiInputConnection};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::render_grid;
use crate::midi::{format_hex, MidiMessage};
use crate::ohm64::discovery;
use crate::ohm64::sysex::{Polarity, SysexEncoder, FACTORY_RESET, SYNC_HEADER};

/// MIDI sniffer event
#[derive(Debug, Clone)]
pub struct SnifferEvent {
    pub timestamp_ms: u64,
    pub port_name: String,
    pub data: Vec<u8>,
    pub message: Option<MidiMessage>,
}

/// What a sysex payload means to the Ohm64
pub fn describe_sysex(data: &[u8], encoder: &SysexEncoder) -> Option<String> {
    if data == FACTORY_RESET {
        return Some("factory reset".to_string());
    }
    if !data.starts_with(&SYNC_HEADER) {
        return None;
    }

    Some(match encoder.decode_sync(data) {
        Ok(states) => {
            let lit = states.iter().filter(|on| **on).count();
            format!("LED sync, {} lit\n{}", lit, render_grid(&states))
        }
        Err(e) => format!("bad LED sync: {}", e),
    })
}

/// CLI MIDI sniffer
pub async fn run_cli_sniffer(pattern: &str, polarity: Polarity) -> Result<()> {
    println!("{}", "=== Ohm64 MIDI Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let (event_tx, mut event_rx) = mpsc::channel(1000);
    let _connection = connect_input(pattern, event_tx)?;
    let encoder = SysexEncoder::new(polarity);

    println!("{}", "Format: [timestamp] PORT | HEX => PARSED".dimmed());
    println!("{}\n", "─".repeat(80).dimmed());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => print_event(&event, &encoder),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}

fn connect_input(
    pattern: &str,
    event_tx: mpsc::Sender<SnifferEvent>,
) -> Result<MidiInputConnection<()>> {
    let mut midi_in = MidiInput::new("Ohm64-Sniffer")?;
    // LED frames are sysex; midir drops them by default
    midi_in.ignore(midir::Ignore::None);

    let needle = pattern.to_lowercase();
    let found = midi_in.ports().into_iter().find_map(|port| {
        let name = midi_in.port_name(&port).ok()?;
        name.to_lowercase().contains(&needle).then_some((port, name))
    });
    let Some((port, port_name)) = found else {
        bail!("No port found matching pattern: {}", pattern);
    };

    info!("Sniffing: {}", port_name);
    let start_time = Instant::now();

    midi_in
        .connect(
            &port,
            "Ohm64-Sniffer",
            move |_timestamp, data, _| {
                let event = SnifferEvent {
                    timestamp_ms: start_time.elapsed().as_millis() as u64,
                    port_name: port_name.clone(),
                    data: data.to_vec(),
                    message: MidiMessage::parse(data),
                };
                let _ = event_tx.try_send(event);
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("Failed to connect to input port: {}", e))
}

/// Fit a port name in the 20-column port field
fn short_port_name(name: &str) -> String {
    if name.chars().count() > 20 {
        format!("{}...", name.chars().take(17).collect::<String>())
    } else {
        name.to_string()
    }
}

fn print_event(event: &SnifferEvent, encoder: &SysexEncoder) {
    let port = short_port_name(&event.port_name);

    let hex = format_hex(&event.data);
    let hex_colored = match event.message {
        Some(MidiMessage::NoteOn { .. }) => hex.bright_green(),
        Some(MidiMessage::NoteOff { .. }) => hex.bright_red(),
        Some(MidiMessage::ControlChange { .. }) => hex.bright_yellow(),
        Some(MidiMessage::SysEx { .. }) => hex.bright_magenta(),
        None => hex.bright_black(),
    };

    let parsed = match &event.message {
        Some(MidiMessage::SysEx { .. }) => describe_sysex(&event.data, encoder)
            .map(|text| format!(" => {}", text.bright_blue()))
            .unwrap_or_default(),
        Some(msg) => format!(" => {}", msg.to_string().bright_blue()),
        None => String::new(),
    };

    println!(
        "[{}ms] {:20} | {}{}",
        format!("{:08}", event.timestamp_ms).dimmed(),
        port.white(),
        hex_colored,
        parsed
    );
}

/// List all ports in a formatted way
pub fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let sections = [
        ("Input Ports:", discovery::discover_input_ports()),
        ("Output Ports:", discovery::discover_output_ports()),
    ];

    for (title, ports) in sections {
        let Ok(ports) = ports else { continue };
        println!("\n{}", title.bold());
        if ports.is_empty() {
            println!("  {}", "No ports found".dimmed());
        }
        for port in ports {
            let marker = if port.is_virtual {
                "[VIRTUAL]".yellow()
            } else {
                "[PHYSICAL]".green()
            };
            println!("  {} {}", marker, port.name);
        }
    }

    if let Some((input, output)) = discovery::find_ohm64_ports() {
        println!("\n{}", "Auto-detected Ohm64:".bold().bright_green());
        println!("  Input:  {}", input.bright_white());
        println!("  Output: {}", output.bright_white());
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ohm64::layout::BUTTON_COUNT;

    #[test]
    fn test_short_port_name() {
        assert_eq!(short_port_name("Ohm64"), "Ohm64");
        assert_eq!(
            short_port_name("Livid Ohm64 MIDI Port 1"),
            "Livid Ohm64 MIDI ..."
        );

        // multi-byte characters straddling the cut
        let name = short_port_name("Livid Ohm64 – Контроллер 1");
        assert_eq!(name, "Livid Ohm64 – Кон...");
        assert_eq!(name.chars().count(), 20);
    }

    #[test]
    fn test_describe_factory_reset() {
        let encoder = SysexEncoder::default();
        assert_eq!(
            describe_sysex(&FACTORY_RESET, &encoder).as_deref(),
            Some("factory reset")
        );
    }

    #[test]
    fn test_describe_led_sync() {
        let encoder = SysexEncoder::default();
        let mut states = [false; BUTTON_COUNT];
        states[0] = true;
        let frame = encoder.sync(&states);

        let text = describe_sysex(frame.as_bytes(), &encoder).unwrap();
        assert!(text.starts_with("LED sync, 1 lit\n# . . ."));
    }

    #[test]
    fn test_describe_other_sysex() {
        let encoder = SysexEncoder::default();
        assert_eq!(describe_sysex(&[0xF0, 0x7E, 0x00, 0x06, 0x01, 0xF7], &encoder), None);

        let truncated = &SYNC_HEADER[..];
        assert!(describe_sysex(truncated, &encoder)
            .unwrap()
            .starts_with("bad LED sync"));
    }
}

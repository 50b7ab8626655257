//! Ohm64 GW
//!
//! Keeps the button/LED grid of a Livid Ohm64 in sync with a host: per-button
//! input policies (toggle, trigger, blink), the logical state table, and the
//! LED-matrix sysex encoding the device expects.

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod midi;
pub mod ohm64;
pub mod sniffer;
pub mod surface;
pub mod transport;

pub use error::{Result, SurfaceError};
pub use surface::{Surface, SurfaceOptions};

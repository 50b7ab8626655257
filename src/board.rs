//! Board state - logical state of the 64 grid buttons
//!
//! This module owns everything the surface knows about its buttons: the
//! on/off table, which buttons are blinking, and the input policy that turns
//! presses into state changes. Nothing here talks to MIDI directly.

mod blink;
mod policy;
mod store;
mod types;

pub use blink::{BlinkScheduler, DEFAULT_BLINK_PERIOD};
pub use policy::InputPolicy;
pub use store::ButtonStateStore;
pub use types::{Button, ButtonId};

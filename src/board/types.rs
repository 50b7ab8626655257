//! Button type definitions

use std::fmt;

use crate::error::{Result, SurfaceError};
use crate::ohm64::layout::BUTTON_COUNT;

/// Logical button id, always in 0-63
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ButtonId(u8);

impl ButtonId {
    pub fn new(id: u32) -> Result<Self> {
        if (id as usize) < BUTTON_COUNT {
            Ok(Self(id as u8))
        } else {
            Err(SurfaceError::ButtonOutOfRange { id })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Every id on the grid, in order
    pub fn all() -> impl Iterator<Item = ButtonId> {
        (0..BUTTON_COUNT as u8).map(ButtonId)
    }
}

impl TryFrom<u8> for ButtonId {
    type Error = SurfaceError;

    fn try_from(id: u8) -> Result<Self> {
        Self::new(u32::from(id))
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical state of one button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Button {
    /// LED / press state
    pub state: bool,
    /// A blink task is running for this button
    pub blinking: bool,
}

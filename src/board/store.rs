//! ButtonStateStore - the 64-entry button table

use super::types::{Button, ButtonId};
use crate::error::{Result, SurfaceError};
use crate::ohm64::layout::BUTTON_COUNT;

/// Owns the logical state of every button.
///
/// Mutations here have no side effects; callers decide when to notify the
/// device. Blink tasks are owned by `BlinkScheduler`, which keeps the
/// `blinking` flags in step.
#[derive(Debug, Clone)]
pub struct ButtonStateStore {
    buttons: [Button; BUTTON_COUNT],
}

impl ButtonStateStore {
    pub fn new() -> Self {
        Self {
            buttons: [Button::default(); BUTTON_COUNT],
        }
    }

    pub fn get(&self, id: ButtonId) -> Button {
        self.buttons[id.index()]
    }

    pub fn set(&mut self, id: ButtonId, state: bool) {
        self.buttons[id.index()].state = state;
    }

    /// Flip the state, returning the new value
    pub fn toggle(&mut self, id: ButtonId) -> bool {
        let button = &mut self.buttons[id.index()];
        button.state = !button.state;
        button.state
    }

    pub(crate) fn set_blinking(&mut self, id: ButtonId, blinking: bool) {
        self.buttons[id.index()].blinking = blinking;
    }

    /// Reset every entry to off / not blinking.
    ///
    /// Running blink tasks must be cancelled through the scheduler first.
    pub fn clear(&mut self) {
        self.buttons = [Button::default(); BUTTON_COUNT];
    }

    /// Overwrite every state positionally. Nothing changes unless exactly
    /// 64 values are given.
    pub fn set_bulk(&mut self, values: &[bool]) -> Result<()> {
        if values.len() != BUTTON_COUNT {
            return Err(SurfaceError::BulkLength {
                expected: BUTTON_COUNT,
                actual: values.len(),
            });
        }

        for (button, value) in self.buttons.iter_mut().zip(values) {
            button.state = *value;
        }
        Ok(())
    }

    /// On/off state of every button, indexed by id
    pub fn states(&self) -> [bool; BUTTON_COUNT] {
        self.buttons.map(|button| button.state)
    }

    pub fn blinking_count(&self) -> usize {
        self.buttons.iter().filter(|b| b.blinking).count()
    }
}

impl Default for ButtonStateStore {
    fn default() -> Self {
        Self::new()
    }
}

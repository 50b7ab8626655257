//! Surface - connection-scoped context for one Ohm64
//!
//! Turns button events into board mutations through the selected input
//! policy and queues the resulting MIDI for the device. All mutation happens
//! under a single lock, and outbound messages are queued while that lock is
//! held, so the device sees updates in the order they were applied.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::board::{BlinkScheduler, Button, ButtonId, ButtonStateStore, InputPolicy, DEFAULT_BLINK_PERIOD};
use crate::error::Result;
use crate::midi::MidiMessage;
use crate::ohm64::layout::{self, BUTTON_COUNT};
use crate::ohm64::sysex::{Polarity, SysexEncoder, SysexFrame};

/// Construction parameters for a [`Surface`]
#[derive(Debug, Clone, Copy)]
pub struct SurfaceOptions {
    pub policy: InputPolicy,
    pub blink_period: Duration,
    pub polarity: Polarity,
    /// Channel nibble of the per-button note messages
    pub note_channel: u8,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            policy: InputPolicy::default(),
            blink_period: DEFAULT_BLINK_PERIOD,
            polarity: Polarity::default(),
            note_channel: 0,
        }
    }
}

struct Board {
    store: ButtonStateStore,
    blinks: BlinkScheduler,
    policy: InputPolicy,
    encoder: SysexEncoder,
}

struct Shared {
    board: Mutex<Board>,
    outbound: mpsc::UnboundedSender<MidiMessage>,
    note_channel: u8,
}

impl Shared {
    fn emit(&self, message: MidiMessage) {
        trace!("Queue {}", message);
        if self.outbound.send(message).is_err() {
            debug!("Outbound queue closed, dropping message");
        }
    }

    fn emit_button(&self, id: ButtonId, state: bool) {
        self.emit(MidiMessage::button_led(self.note_channel, id.get(), state));
    }

    fn emit_sync(&self, board: &Board) {
        let frame = board.encoder.sync(&board.store.states());
        self.emit(frame.into_message());
    }

    fn toggle_locked(&self, board: &mut Board, id: ButtonId) {
        let state = board.store.toggle(id);
        self.emit_button(id, state);
    }

    /// One blink tick. Returns false once the blink is no longer current.
    fn blink_tick(&self, id: ButtonId, generation: u64) -> bool {
        let mut board = self.board.lock();
        if !board.blinks.is_current(id, generation) {
            return false;
        }
        self.toggle_locked(&mut board, id);
        true
    }
}

fn spawn_blink(shared: Weak<Shared>, id: ButtonId, generation: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else { break };
            if !shared.blink_tick(id, generation) {
                break;
            }
        }
    })
}

/// Handle on one connected surface. Cheap to clone.
#[derive(Clone)]
pub struct Surface {
    shared: Arc<Shared>,
}

impl Surface {
    /// Validate the hardware layout and create a surface. The receiver
    /// yields every message destined for the device.
    pub fn new(options: SurfaceOptions) -> Result<(Self, mpsc::UnboundedReceiver<MidiMessage>)> {
        layout::validate()?;

        let (outbound, rx) = mpsc::unbounded_channel();
        let board = Board {
            store: ButtonStateStore::new(),
            blinks: BlinkScheduler::new(options.blink_period),
            policy: options.policy,
            encoder: SysexEncoder::new(options.polarity),
        };

        info!(
            "Surface ready (policy: {}, blink: {:?}, polarity: {:?})",
            options.policy, options.blink_period, options.polarity
        );

        let surface = Self {
            shared: Arc::new(Shared {
                board: Mutex::new(board),
                outbound,
                note_channel: options.note_channel & 0x0F,
            }),
        };
        Ok((surface, rx))
    }

    // =========================================================================
    // Input policies
    // =========================================================================

    /// Entry point for raw button events. `value` is key-down for toggle and
    /// blink, and the passthrough state for trigger.
    pub fn on_button_event(&self, id: u32, value: bool) -> Result<()> {
        let id = ButtonId::new(id)?;
        let policy = self.policy();
        trace!("Button {} -> {} ({})", id, value, policy);

        match policy {
            InputPolicy::Toggle => self.toggle(id, value),
            InputPolicy::Trigger => self.trigger(id, value),
            InputPolicy::Blink => self.blink(id, value),
        }
        Ok(())
    }

    /// Flip on key-down, ignore key-up
    pub fn toggle(&self, id: ButtonId, key_down: bool) {
        if !key_down {
            return;
        }
        let mut board = self.shared.board.lock();
        self.shared.toggle_locked(&mut board, id);
    }

    /// Follow the incoming value
    pub fn trigger(&self, id: ButtonId, value: bool) {
        let mut board = self.shared.board.lock();
        board.store.set(id, value);
        self.shared.emit_button(id, value);
    }

    /// Start blinking an idle button, stop (and switch off) a blinking one
    pub fn blink(&self, id: ButtonId, key_down: bool) {
        if !key_down {
            return;
        }

        let mut board = self.shared.board.lock();
        let Board { store, blinks, .. } = &mut *board;

        if blinks.is_blinking(id) {
            blinks.stop(store, id);
            self.shared.emit_button(id, false);
        } else {
            let weak = Arc::downgrade(&self.shared);
            blinks.start(store, id, |generation, period| {
                spawn_blink(weak, id, generation, period)
            });
        }
    }

    pub fn policy(&self) -> InputPolicy {
        self.shared.board.lock().policy
    }

    /// Select a policy by name. Unknown names leave the current one active.
    pub fn set_policy(&self, name: &str) -> Result<InputPolicy> {
        let policy: InputPolicy = name.parse()?;
        self.set_policy_kind(policy);
        Ok(policy)
    }

    pub fn set_policy_kind(&self, policy: InputPolicy) {
        let mut board = self.shared.board.lock();
        if board.policy != policy {
            info!("Input policy: {} -> {}", board.policy, policy);
            board.policy = policy;
        }
    }

    // =========================================================================
    // Bulk and administrative commands
    // =========================================================================

    /// Overwrite all 64 states and send one full sync
    pub fn bulk_update(&self, values: &[bool]) -> Result<()> {
        let mut board = self.shared.board.lock();
        board.store.set_bulk(values)?;
        self.shared.emit_sync(&board);
        Ok(())
    }

    /// Cancel every blink, switch everything off and send one full sync
    pub fn clear(&self) {
        let mut board = self.shared.board.lock();
        let Board { store, blinks, .. } = &mut *board;
        blinks.cancel_all(store);
        store.clear();
        self.shared.emit_sync(&board);
        debug!("Surface cleared");
    }

    /// Send the current state as a full LED-sync frame
    pub fn sync(&self) {
        let board = self.shared.board.lock();
        self.shared.emit_sync(&board);
    }

    pub fn factory_reset(&self) {
        info!("Sending factory reset");
        self.shared.emit(SysexEncoder::factory_reset().into_message());
    }

    // =========================================================================
    // Queries and live settings
    // =========================================================================

    pub fn button(&self, id: ButtonId) -> Button {
        self.shared.board.lock().store.get(id)
    }

    pub fn snapshot(&self) -> [bool; BUTTON_COUNT] {
        self.shared.board.lock().store.states()
    }

    /// The frame `sync` would send right now
    pub fn sync_frame(&self) -> SysexFrame {
        let board = self.shared.board.lock();
        board.encoder.sync(&board.store.states())
    }

    pub fn blinking_count(&self) -> usize {
        self.shared.board.lock().blinks.active_count()
    }

    pub fn set_blink_period(&self, period: Duration) {
        self.shared.board.lock().blinks.set_period(period);
    }

    /// Change the LED bit sense and resend the grid
    pub fn set_polarity(&self, polarity: Polarity) {
        let mut board = self.shared.board.lock();
        if board.encoder.polarity() != polarity {
            board.encoder.set_polarity(polarity);
            self.shared.emit_sync(&board);
        }
    }

    /// Apply reloaded live settings. The note channel stays as constructed.
    pub fn reconfigure(&self, options: SurfaceOptions) {
        self.set_policy_kind(options.policy);
        self.set_blink_period(options.blink_period);
        self.set_polarity(options.polarity);
    }

    /// Cancel every blink without emitting anything
    pub fn shutdown(&self) {
        let mut board = self.shared.board.lock();
        let Board { store, blinks, .. } = &mut *board;
        blinks.cancel_all(store);
    }
}

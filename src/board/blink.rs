//! BlinkScheduler - one cancelable periodic toggle per button
//!
//! Each `start` hands out a fresh generation number. The tick task must hold
//! the board lock and call [`BlinkScheduler::is_current`] before touching
//! state, so a tick that was already queued when `stop` ran sees a stale
//! generation and exits without mutating anything.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::store::ButtonStateStore;
use super::types::ButtonId;

/// Blink cadence
pub const DEFAULT_BLINK_PERIOD: Duration = Duration::from_millis(100);

struct BlinkHandle {
    generation: u64,
    task: JoinHandle<()>,
}

pub struct BlinkScheduler {
    period: Duration,
    next_generation: u64,
    active: HashMap<ButtonId, BlinkHandle>,
}

impl BlinkScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_generation: 0,
            active: HashMap::new(),
        }
    }

    /// Applies to blinks started afterwards
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    pub fn is_blinking(&self, id: ButtonId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// True while `generation` is the live blink for `id`
    pub fn is_current(&self, id: ButtonId, generation: u64) -> bool {
        self.active
            .get(&id)
            .is_some_and(|handle| handle.generation == generation)
    }

    /// Idle -> Blinking. `spawn` receives the generation and period and must
    /// return the tick task. No-op (returns false) if already blinking.
    pub fn start<F>(&mut self, store: &mut ButtonStateStore, id: ButtonId, spawn: F) -> bool
    where
        F: FnOnce(u64, Duration) -> JoinHandle<()>,
    {
        if self.is_blinking(id) {
            return false;
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let task = spawn(generation, self.period);
        self.active.insert(id, BlinkHandle { generation, task });
        store.set_blinking(id, true);

        debug!("Blink started for button {} (gen {})", id, generation);
        true
    }

    /// Blinking -> Idle. Cancels the task and forces the button off.
    /// No-op (returns false) if idle.
    pub fn stop(&mut self, store: &mut ButtonStateStore, id: ButtonId) -> bool {
        let Some(handle) = self.active.remove(&id) else {
            return false;
        };

        handle.task.abort();
        store.set_blinking(id, false);
        store.set(id, false);

        debug!("Blink stopped for button {} (gen {})", id, handle.generation);
        true
    }

    /// Cancel every blink without touching button state beyond the flags
    pub fn cancel_all(&mut self, store: &mut ButtonStateStore) {
        for (id, handle) in self.active.drain() {
            handle.task.abort();
            store.set_blinking(id, false);
        }
    }
}

impl Default for BlinkScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BLINK_PERIOD)
    }
}

impl Drop for BlinkScheduler {
    fn drop(&mut self) {
        for handle in self.active.values() {
            handle.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> ButtonId {
        ButtonId::new(n).unwrap()
    }

    fn idle_task(_generation: u64, _period: Duration) -> JoinHandle<()> {
        tokio::spawn(std::future::pending())
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let mut store = ButtonStateStore::new();
        let mut blinks = BlinkScheduler::default();

        assert!(blinks.start(&mut store, id(4), idle_task));
        assert!(!blinks.start(&mut store, id(4), |_, _| unreachable!()));
        assert_eq!(blinks.active_count(), 1);
        assert!(store.get(id(4)).blinking);
    }

    #[tokio::test]
    async fn test_stop_forces_off_and_invalidates_generation() {
        let mut store = ButtonStateStore::new();
        let mut blinks = BlinkScheduler::default();

        let mut seen = None;
        blinks.start(&mut store, id(4), |generation, period| {
            seen = Some(generation);
            assert_eq!(period, DEFAULT_BLINK_PERIOD);
            idle_task(generation, period)
        });
        let generation = seen.unwrap();
        store.set(id(4), true);

        assert!(blinks.is_current(id(4), generation));
        assert!(blinks.stop(&mut store, id(4)));
        assert!(!blinks.is_current(id(4), generation));
        assert_eq!(store.get(id(4)), Default::default());

        assert!(!blinks.stop(&mut store, id(4)));
    }

    #[tokio::test]
    async fn test_restart_gets_new_generation() {
        let mut store = ButtonStateStore::new();
        let mut blinks = BlinkScheduler::new(Duration::from_millis(250));

        let mut generations = Vec::new();
        for _ in 0..2 {
            blinks.start(&mut store, id(1), |generation, period| {
                generations.push(generation);
                assert_eq!(period, Duration::from_millis(250));
                idle_task(generation, period)
            });
            blinks.stop(&mut store, id(1));
        }

        assert_eq!(generations.len(), 2);
        assert_ne!(generations[0], generations[1]);
    }

    #[tokio::test]
    async fn test_cancel_all_clears_flags() {
        let mut store = ButtonStateStore::new();
        let mut blinks = BlinkScheduler::default();
        blinks.start(&mut store, id(1), idle_task);
        blinks.start(&mut store, id(2), idle_task);

        blinks.cancel_all(&mut store);
        assert_eq!(blinks.active_count(), 0);
        assert_eq!(store.blinking_count(), 0);
    }
}

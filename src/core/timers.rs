//! # Timers manager.
//!
//! Owns the executor's view of its timers. Timers never go through the ready queue:
//! the spin loop asks the manager for the next expiry, sleeps until then (or until
//! something else wakes it), and runs every due timer before draining events.
//!
//! ## Rules
//! - Timers are held weakly; a dropped timer disappears on the next query.
//! - A timer is registered at most once.
//! - Registering or resetting a timer wakes the executor so it recomputes its deadline.
//! - Due timers run oldest expiry first; the lock is released before any callback runs.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::entities::Timer;

use super::ready::ReadyQueue;

/// Registry of the timers one executor drives.
pub struct TimersManager {
    timers: Mutex<Vec<Weak<Timer>>>,
    wake: Weak<ReadyQueue>,
}

impl TimersManager {
    pub(crate) fn new(ready: &Arc<ReadyQueue>) -> Self {
        Self {
            timers: Mutex::new(Vec::new()),
            wake: Arc::downgrade(ready),
        }
    }

    fn wake_executor(&self) {
        if let Some(queue) = self.wake.upgrade() {
            queue.wake();
        }
    }

    fn live(&self) -> Vec<Arc<Timer>> {
        let mut timers = self.timers.lock();
        timers.retain(|t| t.strong_count() > 0);
        timers.iter().filter_map(Weak::upgrade).collect()
    }

    /// Registers `timer`; a timer already present is ignored.
    pub fn add_timer(&self, timer: &Arc<Timer>) {
        {
            let mut timers = self.timers.lock();
            if timers.iter().any(|t| std::ptr::eq(t.as_ptr(), Arc::as_ptr(timer))) {
                return;
            }
            timers.push(Arc::downgrade(timer));
        }
        let wake = self.wake.clone();
        timer.set_on_reset_callback(Some(Arc::new(move || {
            if let Some(queue) = wake.upgrade() {
                queue.wake();
            }
        })));
        self.wake_executor();
    }

    pub fn remove_timer(&self, timer: &Arc<Timer>) {
        self.timers
            .lock()
            .retain(|t| !std::ptr::eq(t.as_ptr(), Arc::as_ptr(timer)));
        timer.set_on_reset_callback(None);
    }

    /// Forgets every timer.
    pub fn clear_all(&self) {
        let drained: Vec<_> = self.timers.lock().drain(..).collect();
        for timer in drained.iter().filter_map(Weak::upgrade) {
            timer.set_on_reset_callback(None);
        }
    }

    /// Number of live registered timers.
    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest expiry across live, non-canceled timers.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.live().iter().filter_map(|t| t.next_call()).min()
    }

    /// Time until the earliest expiry (`Duration::ZERO` if overdue).
    pub fn get_head_timeout(&self) -> Option<Duration> {
        self.next_expiry()
            .map(|next| next.saturating_duration_since(Instant::now()))
    }

    fn due(&self) -> Vec<Arc<Timer>> {
        let now = Instant::now();
        let mut due: Vec<(Instant, Arc<Timer>)> = self
            .live()
            .into_iter()
            .filter_map(|t| t.next_call().filter(|at| *at <= now).map(|at| (at, t)))
            .collect();
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, t)| t).collect()
    }

    /// Number of timers due right now.
    pub fn get_number_ready_timers(&self) -> usize {
        self.due().len()
    }

    /// Runs every due timer, oldest expiry first; returns how many fired.
    pub fn execute_ready_timers(&self) -> usize {
        self.due()
            .into_iter()
            .filter(|timer| timer.execute_callback())
            .count()
    }

    /// Runs only the oldest due timer; returns `true` if one fired.
    pub fn execute_head_timer(&self) -> bool {
        self.due()
            .into_iter()
            .next()
            .is_some_and(|timer| timer.execute_callback())
    }
}

impl std::fmt::Debug for TimersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimersManager")
            .field("timers", &self.timers.lock().len())
            .finish()
    }
}

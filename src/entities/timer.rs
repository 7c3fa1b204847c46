//! # Periodic timer.
//!
//! A [`Timer`] fires its callback every `period` on the steady clock
//! (`tokio::time::Instant`, so paused test time applies). Timers are not pushed
//! through the ready queue: the executor's timer manager tracks their next expiry
//! and runs them when due.
//!
//! ## Rules
//! - A canceled timer is never ready and reports no expiry until [`Timer::reset`].
//! - Missed periods are skipped, not replayed: after a late execution the next call
//!   is the first period boundary strictly in the future.
//! - [`Timer::reset`] notifies the owning timer manager so a waiting executor
//!   recomputes its deadline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::EntityId;

pub(crate) type ResetHook = Arc<dyn Fn() + Send + Sync>;

/// Roughly thirty years; stands in for expiries past what `Instant` can represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + delay`, clamped to a far-future instant instead of overflowing.
fn deadline_after(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

struct TimerState {
    next_call: Instant,
    canceled: bool,
}

/// Periodic timer entity.
pub struct Timer {
    id: EntityId,
    period: Duration,
    state: Mutex<TimerState>,
    callback: Mutex<Box<dyn FnMut() + Send>>,
    on_reset: Mutex<Option<ResetHook>>,
}

impl Timer {
    /// Creates a timer whose first expiry is one `period` from now.
    pub fn new<F>(period: Duration, callback: F) -> Arc<Self>
    where
        F: FnMut() + Send + 'static,
    {
        Arc::new(Self {
            id: EntityId::next(),
            period,
            state: Mutex::new(TimerState {
                next_call: deadline_after(Instant::now(), period),
                canceled: false,
            }),
            callback: Mutex::new(Box::new(callback)),
            on_reset: Mutex::new(None),
        })
    }

    pub fn entity_id(&self) -> EntityId {
        self.id
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stops the timer; it stays registered but never fires until reset.
    pub fn cancel(&self) {
        self.state.lock().canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.state.lock().canceled
    }

    /// Re-arms the timer: clears cancellation and schedules the next call one period
    /// from now.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock();
            state.canceled = false;
            state.next_call = deadline_after(Instant::now(), self.period);
        }
        let hook = self.on_reset.lock().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// True if the timer is active and its next call is due.
    pub fn is_ready(&self) -> bool {
        let state = self.state.lock();
        !state.canceled && state.next_call <= Instant::now()
    }

    /// Time left until the next call (`Duration::ZERO` when overdue), `None` when canceled.
    pub fn time_until_trigger(&self) -> Option<Duration> {
        self.next_call()
            .map(|next| next.saturating_duration_since(Instant::now()))
    }

    /// Next expiry, `None` when canceled.
    pub(crate) fn next_call(&self) -> Option<Instant> {
        let state = self.state.lock();
        (!state.canceled).then_some(state.next_call)
    }

    /// Runs the callback if the timer is due.
    ///
    /// The next call is advanced before the callback runs, so a callback that resets
    /// or cancels its own timer wins over the advance.
    pub fn execute_callback(&self) -> bool {
        {
            let mut state = self.state.lock();
            let now = Instant::now();
            if state.canceled || state.next_call > now {
                return false;
            }
            state.next_call = self.following_call(state.next_call, now);
        }
        (self.callback.lock())();
        true
    }

    /// First period boundary after `now`, counted from `due`.
    fn following_call(&self, due: Instant, now: Instant) -> Instant {
        let period = self.period.as_nanos();
        if period == 0 {
            return now;
        }
        let behind = now.saturating_duration_since(due).as_nanos();
        let ahead = (behind / period + 1).saturating_mul(period);
        let ahead = u64::try_from(ahead / 1_000_000_000)
            .map(|secs| Duration::new(secs, (ahead % 1_000_000_000) as u32))
            .unwrap_or(Duration::MAX);
        deadline_after(due, ahead)
    }

    pub(crate) fn set_on_reset_callback(&self, hook: Option<ResetHook>) {
        *self.on_reset.lock() = hook;
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("period", &self.period)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

//! Push-callback slot shared by every event-driven endpoint.
//!
//! Data may arrive before any executor is wired to the endpoint. The slot counts such
//! arrivals and replays them (one pushed event per unread arrival) as soon as a
//! callback is installed, so nothing that was ready goes unnoticed. A coalescing slot
//! (guard conditions) replays at most one event: its arrivals carry no data.

use parking_lot::Mutex;

use crate::core::EventsCallback;

#[derive(Default)]
struct SlotState {
    callback: Option<EventsCallback>,
    unread: usize,
}

/// Holds the executor callback of one entity plus the unread counter.
#[derive(Default)]
pub(crate) struct ListenerSlot {
    state: Mutex<SlotState>,
    coalesce: bool,
}

impl ListenerSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn coalescing() -> Self {
        Self {
            state: Mutex::default(),
            coalesce: true,
        }
    }

    /// Installs (or clears with `None`) the executor callback.
    ///
    /// Installing replays every unread arrival.
    pub(crate) fn set(&self, callback: Option<EventsCallback>) {
        let replay = {
            let mut state = self.state.lock();
            state.callback = callback.clone();
            if callback.is_some() {
                let unread = std::mem::take(&mut state.unread);
                if self.coalesce { unread.min(1) } else { unread }
            } else {
                0
            }
        };

        if let Some(cb) = callback {
            for _ in 0..replay {
                if !cb.push() {
                    self.state.lock().unread += 1;
                }
            }
        }
    }

    /// Reports one arrival.
    pub(crate) fn notify(&self) {
        let callback = {
            let mut state = self.state.lock();
            match &state.callback {
                Some(cb) => Some(cb.clone()),
                None => {
                    state.unread += 1;
                    None
                }
            }
        };

        if let Some(cb) = callback {
            if !cb.push() {
                self.state.lock().unread += 1;
            }
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    #[cfg(test)]
    pub(crate) fn unread(&self) -> usize {
        self.state.lock().unread
    }
}

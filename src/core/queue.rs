//! # Events queue: storage for ready executor events.
//!
//! [`EventsQueue`] is the storage behind the executor's ready queue. The executor
//! wraps it in a lock and pairs it with a wakeup signal (see `ready.rs`); the queue
//! itself is a plain single-threaded container.
//!
//! [`SimpleEventsQueue`] is the default: an unbounded FIFO.
//!
//! ## Rules
//! - FIFO order is the tie-break for callback invocation order.
//! - `take_all` empties the queue and hands every pending event to the caller.
//! - `init` drops everything pending (used when an executor is reused from scratch).

use std::collections::VecDeque;

use super::ready::ExecutorEvent;

/// Container for ready executor events.
pub trait EventsQueue: Send + 'static {
    /// Resets the queue to an empty state.
    fn init(&mut self);

    /// Appends an event at the back.
    fn push(&mut self, event: ExecutorEvent);

    /// Oldest pending event, if any.
    fn front(&self) -> Option<&ExecutorEvent>;

    /// Removes and returns the oldest pending event.
    fn pop(&mut self) -> Option<ExecutorEvent>;

    fn is_empty(&self) -> bool;

    fn len(&self) -> usize;

    /// Removes and returns every pending event, oldest first.
    fn take_all(&mut self) -> VecDeque<ExecutorEvent>;
}

/// Unbounded FIFO events queue.
#[derive(Debug, Default)]
pub struct SimpleEventsQueue {
    events: VecDeque<ExecutorEvent>,
}

impl SimpleEventsQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventsQueue for SimpleEventsQueue {
    fn init(&mut self) {
        self.events.clear();
    }

    #[inline]
    fn push(&mut self, event: ExecutorEvent) {
        self.events.push_back(event);
    }

    #[inline]
    fn front(&self) -> Option<&ExecutorEvent> {
        self.events.front()
    }

    #[inline]
    fn pop(&mut self) -> Option<ExecutorEvent> {
        self.events.pop_front()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    fn len(&self) -> usize {
        self.events.len()
    }

    fn take_all(&mut self) -> VecDeque<ExecutorEvent> {
        std::mem::take(&mut self.events)
    }
}

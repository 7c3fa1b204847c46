//! # Ready queue: pushed events plus the executor wakeup signal.
//!
//! Entities never call into the executor directly. Each one is handed an
//! [`EventsCallback`]: a weak token to the executor's [`ReadyQueue`] plus the
//! `(entity, type, node)` triple to enqueue. Pushing is thread-safe and may happen
//! from any thread, runtime or not.
//!
//! ```text
//! entity (any thread)                       spinning task
//!   EventsCallback::push()                    ReadyQueue::wait(deadline, cancel)
//!        │                                         ▲
//!        ├──► lock ─► EventsQueue::push ─► unlock  │
//!        └──► Notify::notify_one ──────────────────┘
//! ```
//!
//! ## Rules
//! - The queue lock is held only across the container mutation.
//! - `notify_one` stores a permit when nobody waits, so a push that races with the
//!   start of a wait is never lost.
//! - A callback whose executor is gone turns into a no-op (`push` returns `false`).

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::entities::EntityId;
use crate::node::NodeId;

use super::queue::EventsQueue;

/// Kind of work an executor event stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorEventType {
    Subscription,
    Service,
    Client,
    Waitable,
}

/// One ready-queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorEvent {
    /// Entity with pending work.
    pub entity: EntityId,
    pub kind: ExecutorEventType,
    /// Owning node, `None` for executor-internal entities.
    pub node: Option<NodeId>,
}

/// Result of [`ReadyQueue::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// At least one event is queued.
    Ready,
    /// Woken without events (timer set changed); recompute the deadline.
    Notified,
    TimedOut,
    Canceled,
}

/// Lock-protected events queue paired with a wakeup signal.
pub struct ReadyQueue {
    events: Mutex<Box<dyn EventsQueue>>,
    notify: Notify,
}

impl ReadyQueue {
    pub(crate) fn new(queue: Box<dyn EventsQueue>) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(queue),
            notify: Notify::new(),
        })
    }

    /// Enqueues an event and wakes the spinning task.
    pub(crate) fn push(&self, event: ExecutorEvent) {
        self.events.lock().push(event);
        self.notify.notify_one();
    }

    /// Wakes the spinning task without enqueuing anything.
    pub(crate) fn wake(&self) {
        self.notify.notify_one();
    }

    pub(crate) fn pop(&self) -> Option<ExecutorEvent> {
        self.events.lock().pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Suspends until an event is queued, `deadline` passes, `cancel` fires or
    /// someone calls [`wake`](Self::wake).
    ///
    /// `deadline = None` waits without a time bound.
    pub(crate) async fn wait(&self, deadline: Option<Instant>, cancel: &CancellationToken) -> Wake {
        if cancel.is_cancelled() {
            return Wake::Canceled;
        }
        if !self.is_empty() {
            return Wake::Ready;
        }
        if deadline.is_some_and(|d| d <= Instant::now()) {
            return Wake::TimedOut;
        }

        let expiry = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Wake::Canceled,
            _ = self.notify.notified() => {
                if self.is_empty() { Wake::Notified } else { Wake::Ready }
            }
            _ = expiry => {
                if self.is_empty() { Wake::TimedOut } else { Wake::Ready }
            }
        }
    }
}

impl fmt::Debug for ReadyQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyQueue").field("len", &self.len()).finish()
    }
}

/// Push-callback handed to entities by the entities collector.
///
/// Holds the executor token (a weak reference to its ready queue) and the event to
/// enqueue. Cloning is cheap.
#[derive(Clone)]
pub struct EventsCallback {
    queue: Weak<ReadyQueue>,
    event: ExecutorEvent,
}

impl EventsCallback {
    pub(crate) fn new(queue: &Arc<ReadyQueue>, event: ExecutorEvent) -> Self {
        Self {
            queue: Arc::downgrade(queue),
            event,
        }
    }

    /// The event this callback enqueues.
    pub fn event(&self) -> ExecutorEvent {
        self.event
    }

    /// Enqueues the event; returns `false` if the executor no longer exists.
    pub fn push(&self) -> bool {
        match self.queue.upgrade() {
            Some(queue) => {
                queue.push(self.event);
                true
            }
            None => false,
        }
    }

    /// True if both callbacks target the same executor.
    pub fn same_executor(&self, other: &EventsCallback) -> bool {
        Weak::ptr_eq(&self.queue, &other.queue)
    }
}

impl fmt::Debug for EventsCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventsCallback")
            .field("event", &self.event)
            .field("alive", &(self.queue.strong_count() > 0))
            .finish()
    }
}

//! # Event bus.
//!
//! [`Bus`] broadcasts [`Event`]s from the executor (spinning task, or whichever
//! thread adds nodes or cancels) to any number of receivers.
//!
//! ```text
//! EventsExecutor, EntitiesCollector, SubscriberSet workers
//!        │ publish (never blocks)
//!        ▼
//!       Bus ──► subscriber listener ──► SubscriberSet
//!        └────► EventsExecutor::subscribe() receivers
//! ```
//!
//! The ring holds the last `capacity` events; a receiver that falls further behind
//! gets `RecvError::Lagged` and resumes at the oldest retained event. Events published
//! while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Clonable handle to an executor's broadcast channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// `capacity` is raised to 1 if zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event published without receivers");
        }
    }

    /// Receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

//! # Executor events.
//!
//! An [`Event`] records something an executor did that is worth observing from the
//! outside: a node changed hands, the entity map was rebuilt, a spin call started or
//! stopped, a queued event had to be skipped, or a subscriber misbehaved.
//!
//! Events are numbered from a process-wide counter (`seq`), so receivers can restore
//! publication order even when they consume events from several executors.
//!
//! ## Example
//! ```rust
//! use events_executor::{Event, EventCategory, EventKind};
//!
//! let ev = Event::new(EventKind::NodeAdded).with_node("/talker");
//!
//! assert_eq!(ev.kind.category(), EventCategory::Topology);
//! assert_eq!(ev.node.as_deref(), Some("/talker"));
//! assert!(ev.count.is_none());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::entities::EntityId;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Coarse grouping of [`EventKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Node ownership and entity wiring.
    Topology,
    /// Spin calls and what happened during them.
    Spin,
    /// Health of event subscribers.
    Subscriber,
}

/// What an [`Event`] reports. The fields each kind fills are listed per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `node`: fully qualified name of the node an executor took over.
    NodeAdded,
    /// `node`: fully qualified name of the node an executor released.
    NodeRemoved,
    /// `count`: entities wired after the rebuild, timers included.
    EntitiesRebuilt,

    /// `reason`: spin variant (`spin`, `spin_some`, `spin_all`, `spin_once`).
    SpinStarted,
    /// `reason`: spin variant; `count`: callbacks executed by the call.
    SpinStopped,
    CancelRequested,
    /// `entity`: id of the entity the queued event named;
    /// `reason`: `entity destroyed` or `entity not wired`.
    StaleEventSkipped,

    /// `subscriber`, `reason`: `full` or `closed`.
    SubscriberOverflow,
    /// `subscriber`, `reason`: panic message.
    SubscriberPanicked,
}

impl EventKind {
    pub fn category(self) -> EventCategory {
        match self {
            EventKind::NodeAdded | EventKind::NodeRemoved | EventKind::EntitiesRebuilt => {
                EventCategory::Topology
            }
            EventKind::SpinStarted
            | EventKind::SpinStopped
            | EventKind::CancelRequested
            | EventKind::StaleEventSkipped => EventCategory::Spin,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                EventCategory::Subscriber
            }
        }
    }
}

/// One executor event; optional fields depend on [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide publication order.
    pub seq: u64,
    pub timestamp: SystemTime,
    pub kind: EventKind,
    pub node: Option<Arc<str>>,
    pub entity: Option<EntityId>,
    pub reason: Option<Arc<str>>,
    pub count: Option<usize>,
    pub subscriber: Option<&'static str>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            timestamp: SystemTime::now(),
            kind,
            node: None,
            entity: None,
            reason: None,
            count: None,
            subscriber: None,
        }
    }

    pub fn with_node(self, node: impl Into<Arc<str>>) -> Self {
        Self {
            node: Some(node.into()),
            ..self
        }
    }

    pub fn with_entity(self, entity: EntityId) -> Self {
        Self {
            entity: Some(entity),
            ..self
        }
    }

    pub fn with_reason(self, reason: impl Into<Arc<str>>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..self
        }
    }

    pub fn with_count(self, count: usize) -> Self {
        Self {
            count: Some(count),
            ..self
        }
    }

    /// `subscriber` dropped an event: its lane was `full` or `closed`.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Self {
            subscriber: Some(subscriber),
            ..Event::new(EventKind::SubscriberOverflow).with_reason(reason)
        }
    }

    /// `subscriber` panicked while handling an event.
    pub fn subscriber_panicked(subscriber: &'static str, message: String) -> Self {
        Self {
            subscriber: Some(subscriber),
            ..Event::new(EventKind::SubscriberPanicked).with_reason(message)
        }
    }

    pub fn is_subscriber_overflow(&self) -> bool {
        self.kind == EventKind::SubscriberOverflow
    }

    pub fn is_subscriber_panic(&self) -> bool {
        self.kind == EventKind::SubscriberPanicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_follows_creation_order() {
        let first = Event::new(EventKind::SpinStarted);
        let second = Event::new(EventKind::SpinStopped);
        assert!(second.seq > first.seq);
    }

    #[test]
    fn test_subscriber_events() {
        let ev = Event::subscriber_overflow("audit", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.kind.category(), EventCategory::Subscriber);
        assert_eq!(ev.subscriber, Some("audit"));
        assert_eq!(ev.reason.as_deref(), Some("full"));

        let ev = Event::subscriber_panicked("audit", "boom".into());
        assert!(ev.is_subscriber_panic());
        assert_eq!(ev.reason.as_deref(), Some("boom"));
    }

    #[test]
    fn test_stale_skip_carries_entity() {
        let id = EntityId::next();
        let ev = Event::new(EventKind::StaleEventSkipped)
            .with_entity(id)
            .with_reason("entity destroyed");
        assert_eq!(ev.kind.category(), EventCategory::Spin);
        assert_eq!(ev.entity, Some(id));
    }
}

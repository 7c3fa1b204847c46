//! # Executable entities.
//!
//! Everything an executor can run is an entity: timers, subscriptions, services,
//! clients and generic waitables. Apart from timers (driven by the timer manager),
//! every entity shares one capability, [`ExecutableEntity`]:
//!
//! - accept a push-callback ([`EventsCallback`]) bound to one executor, or clear it;
//! - run one unit of pending work when the executor drains its event.
//!
//! ```text
//!               ExecutableEntity
//!        ┌───────────┬──────┴─────┬─────────────┐
//!  SubscriptionBase  ServiceBase  ClientBase   Waitable
//!        │               │            │            ├─ QosEventHandler
//!  Subscription<M>   Service<Q,S>  Client<Q,S>     ├─ SubscriptionIntraProcess<M>
//!                                                  ├─ ActionServerIntraProcessBase
//!                                                  └─ NotifyWaitable (executor internal)
//! ```
//!
//! ## Rules
//! - Entities are referenced weakly by callback groups and by the collector; the
//!   last user-held `Arc` decides their lifetime.
//! - Push-driven waitables refuse the legacy wait-set contract with
//!   [`ExecutorError::WaitSetUnsupported`].

mod client;
mod listener;
mod publisher;
mod qos_event;
mod service;
mod subscription;
mod timer;

pub use client::{Client, ClientBase, ResponseCallback};
pub use publisher::{Publisher, PublisherBase};
pub use qos_event::{IncompatibleQosCallback, IncompatibleQosStatus, QosEventHandler, QosEventKind};
pub use service::{Service, ServiceBase};
pub use subscription::{MessageCallback, Subscription, SubscriptionBase};
pub use timer::Timer;

pub(crate) use listener::ListenerSlot;
pub(crate) use subscription::{SharedCallback, shared_callback};

use std::fmt;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::{EventsCallback, ExecutorEventType};
use crate::error::ExecutorError;
use crate::signal::WaitSet;

static ENTITY_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Allocates the next identifier.
    pub fn next() -> Self {
        EntityId(ENTITY_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability shared by every push-driven entity.
pub trait ExecutableEntity: Send + Sync {
    fn entity_id(&self) -> EntityId;

    /// Binds the entity to an executor (`Some`) or unbinds it (`None`).
    ///
    /// While bound, every new unit of work pushes exactly one event through the
    /// callback. Work that arrived while unbound is replayed on binding.
    fn set_events_executor_callback(&self, callback: Option<EventsCallback>);

    /// Runs one unit of pending work, if any.
    fn execute(&self);
}

/// Generic schedulable entity.
///
/// The wait-set methods are the legacy polling contract; the default implementations
/// refuse it because most waitables here are driven by pushed events.
pub trait Waitable: ExecutableEntity {
    fn add_to_wait_set(&self, _wait_set: &mut WaitSet) -> Result<(), ExecutorError> {
        Err(ExecutorError::WaitSetUnsupported { entity: "waitable" })
    }

    fn is_ready(&self, _wait_set: &WaitSet) -> Result<bool, ExecutorError> {
        Err(ExecutorError::WaitSetUnsupported { entity: "waitable" })
    }
}

/// Weak handle of a wired entity, kept by the collector for the liveness check.
#[derive(Clone)]
pub(crate) enum WeakEntity {
    Subscription(Weak<dyn SubscriptionBase>),
    Service(Weak<dyn ServiceBase>),
    Client(Weak<dyn ClientBase>),
    Waitable(Weak<dyn Waitable>),
}

impl WeakEntity {
    pub(crate) fn event_type(&self) -> ExecutorEventType {
        match self {
            WeakEntity::Subscription(_) => ExecutorEventType::Subscription,
            WeakEntity::Service(_) => ExecutorEventType::Service,
            WeakEntity::Client(_) => ExecutorEventType::Client,
            WeakEntity::Waitable(_) => ExecutorEventType::Waitable,
        }
    }

    /// Runs the entity if it is still alive; `false` means it was already destroyed.
    pub(crate) fn execute(&self) -> bool {
        match self {
            WeakEntity::Subscription(w) => w.upgrade().map(|e| e.execute()).is_some(),
            WeakEntity::Service(w) => w.upgrade().map(|e| e.execute()).is_some(),
            WeakEntity::Client(w) => w.upgrade().map(|e| e.execute()).is_some(),
            WeakEntity::Waitable(w) => w.upgrade().map(|e| e.execute()).is_some(),
        }
    }

    pub(crate) fn set_callback(&self, callback: Option<EventsCallback>) {
        match self {
            WeakEntity::Subscription(w) => {
                if let Some(e) = w.upgrade() {
                    e.set_events_executor_callback(callback);
                }
            }
            WeakEntity::Service(w) => {
                if let Some(e) = w.upgrade() {
                    e.set_events_executor_callback(callback);
                }
            }
            WeakEntity::Client(w) => {
                if let Some(e) = w.upgrade() {
                    e.set_events_executor_callback(callback);
                }
            }
            WeakEntity::Waitable(w) => {
                if let Some(e) = w.upgrade() {
                    e.set_events_executor_callback(callback);
                }
            }
        }
    }
}

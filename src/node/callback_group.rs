//! # Callback groups.
//!
//! A [`CallbackGroup`] bundles entities of one node. It holds them weakly, so an
//! entity dropped by its owner simply disappears from the listings. The executor
//! wires every live entity of every group whose `can_be_taken_from` flag is set.
//! Flipping the flag triggers the owning node's guard condition, so the executor
//! rebuilds and picks up (or drops) the group's entities.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::entities::{ClientBase, ServiceBase, SubscriptionBase, Timer, Waitable};
use crate::signal::GuardCondition;

/// Concurrency contract of a group.
///
/// The events executor runs every callback on its spinning task, so both kinds
/// execute serially; the distinction is kept for API parity with multi-threaded
/// executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallbackGroupType {
    #[default]
    MutuallyExclusive,
    Reentrant,
}

fn live<T: ?Sized>(list: &Mutex<Vec<Weak<T>>>) -> Vec<Arc<T>> {
    let mut list = list.lock();
    list.retain(|w| w.strong_count() > 0);
    list.iter().filter_map(Weak::upgrade).collect()
}

/// Weakly held bundle of entities.
pub struct CallbackGroup {
    kind: CallbackGroupType,
    can_be_taken_from: AtomicBool,
    node_guard: Weak<GuardCondition>,
    timers: Mutex<Vec<Weak<Timer>>>,
    subscriptions: Mutex<Vec<Weak<dyn SubscriptionBase>>>,
    services: Mutex<Vec<Weak<dyn ServiceBase>>>,
    clients: Mutex<Vec<Weak<dyn ClientBase>>>,
    waitables: Mutex<Vec<Weak<dyn Waitable>>>,
}

impl CallbackGroup {
    pub(crate) fn new(kind: CallbackGroupType, node_guard: Weak<GuardCondition>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            can_be_taken_from: AtomicBool::new(true),
            node_guard,
            timers: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            services: Mutex::new(Vec::new()),
            clients: Mutex::new(Vec::new()),
            waitables: Mutex::new(Vec::new()),
        })
    }

    pub fn kind(&self) -> CallbackGroupType {
        self.kind
    }

    /// False while the group is disabled; the executor skips it on the next rebuild.
    pub fn can_be_taken_from(&self) -> bool {
        self.can_be_taken_from.load(Ordering::Acquire)
    }

    /// Enables or disables the group; a change triggers the node's guard condition.
    pub fn set_can_be_taken_from(&self, enabled: bool) {
        if self.can_be_taken_from.swap(enabled, Ordering::AcqRel) == enabled {
            return;
        }
        let Some(guard) = self.node_guard.upgrade() else {
            return;
        };
        if let Err(e) = guard.trigger() {
            tracing::debug!(enabled, error = %e, "callback group toggled without notify");
        }
    }

    pub(crate) fn add_timer(&self, timer: &Arc<Timer>) {
        self.timers.lock().push(Arc::downgrade(timer));
    }

    pub(crate) fn add_subscription(&self, subscription: Weak<dyn SubscriptionBase>) {
        self.subscriptions.lock().push(subscription);
    }

    pub(crate) fn add_service(&self, service: Weak<dyn ServiceBase>) {
        self.services.lock().push(service);
    }

    pub(crate) fn add_client(&self, client: Weak<dyn ClientBase>) {
        self.clients.lock().push(client);
    }

    pub(crate) fn add_waitable(&self, waitable: Weak<dyn Waitable>) {
        self.waitables.lock().push(waitable);
    }

    pub fn timers(&self) -> Vec<Arc<Timer>> {
        live(&self.timers)
    }

    pub fn subscriptions(&self) -> Vec<Arc<dyn SubscriptionBase>> {
        live(&self.subscriptions)
    }

    pub fn services(&self) -> Vec<Arc<dyn ServiceBase>> {
        live(&self.services)
    }

    pub fn clients(&self) -> Vec<Arc<dyn ClientBase>> {
        live(&self.clients)
    }

    pub fn waitables(&self) -> Vec<Arc<dyn Waitable>> {
        live(&self.waitables)
    }
}

impl std::fmt::Debug for CallbackGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackGroup")
            .field("kind", &self.kind)
            .field("can_be_taken_from", &self.can_be_taken_from())
            .finish()
    }
}

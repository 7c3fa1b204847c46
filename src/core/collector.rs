//! # Entities collector: which entities an executor serves.
//!
//! The collector tracks the nodes added to one executor and keeps a map from entity
//! id to a weak handle of every entity currently wired to it. Wiring an entity means
//! installing an [`EventsCallback`] that pushes `(entity, type, node)` into the
//! executor's ready queue; timers are handed to the [`TimersManager`] instead.
//!
//! ```text
//! add_node ──► associate ──► bind node guard condition ──► wire entities
//!                                   │
//!          entity created/removed   ▼
//!          node GC trigger ──► ready queue ──► execute(): full rebuild
//! ```
//!
//! ## Rules
//! - A node belongs to at most one executor at a time.
//! - A topology change on any node rebuilds the whole map (no incremental diff).
//! - Groups that cannot be taken from are skipped by the rebuild.
//! - Entities that left the map get their callback cleared.
//! - Nothing is held strongly: lifetime stays with the user's handles.
//! - `add_node`, `remove_node` and rebuilds are serialized, so a rebuild never
//!   discards wiring done by a concurrent `add_node`. No user callback runs under it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::entities::{EntityId, WeakEntity};
use crate::error::ExecutorError;
use crate::events::{Bus, Event, EventKind};
use crate::node::{Node, NodeId};

use super::ready::{EventsCallback, ExecutorEvent, ExecutorEventType, ReadyQueue};
use super::timers::TimersManager;

#[derive(Clone)]
pub(crate) struct WiredEntity {
    pub(crate) node: NodeId,
    pub(crate) entity: WeakEntity,
}

/// Node and entity bookkeeping of one executor.
pub struct EntitiesCollector {
    id: EntityId,
    ready: Weak<ReadyQueue>,
    timers: Arc<TimersManager>,
    bus: Bus,
    nodes: Mutex<Vec<Weak<Node>>>,
    entities: Mutex<HashMap<EntityId, WiredEntity>>,
    rebuild: Mutex<()>,
}

impl EntitiesCollector {
    pub(crate) fn new(ready: &Arc<ReadyQueue>, timers: Arc<TimersManager>, bus: Bus) -> Self {
        Self {
            id: EntityId::next(),
            ready: Arc::downgrade(ready),
            timers,
            bus,
            nodes: Mutex::new(Vec::new()),
            entities: Mutex::new(HashMap::new()),
            rebuild: Mutex::new(()),
        }
    }

    /// Id carried by the events that request a rebuild.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Takes ownership of `node` for this executor and wires its entities.
    pub fn add_node(&self, node: &Arc<Node>) -> Result<(), ExecutorError> {
        let _rebuild = self.rebuild.lock();
        if !node.try_associate() {
            return Err(ExecutorError::NodeAlreadyAdded {
                node: node.fully_qualified_name(),
            });
        }

        let ready = self.ready.upgrade().ok_or_else(|| {
            ExecutorError::transport("Couldn't set node guard condition callback", "executor is gone")
        });
        let bound = ready.and_then(|ready| {
            let callback = EventsCallback::new(
                &ready,
                ExecutorEvent {
                    entity: self.id,
                    kind: ExecutorEventType::Waitable,
                    node: Some(node.id()),
                },
            );
            node.notify_guard_condition()
                .set_on_trigger_callback(Some(callback))
                .map_err(|e| e.with_context("Couldn't set node guard condition callback"))
        });
        if let Err(e) = bound {
            node.disassociate();
            return Err(e);
        }

        self.nodes.lock().push(Arc::downgrade(node));
        let wired = self.wire_node(node);
        self.entities.lock().extend(wired);

        tracing::debug!(node = %node.fully_qualified_name(), "node added to executor");
        self.bus.publish(
            Event::new(EventKind::NodeAdded).with_node(node.fully_qualified_name()),
        );
        Ok(())
    }

    /// Releases `node`: its entities stop pushing events and its timers stop firing here.
    pub fn remove_node(&self, node: &Arc<Node>) -> Result<(), ExecutorError> {
        let _rebuild = self.rebuild.lock();
        let tracked = {
            let mut nodes = self.nodes.lock();
            match nodes.iter().position(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(node))) {
                Some(index) => {
                    nodes.swap_remove(index);
                    true
                }
                None => false,
            }
        };
        if !tracked {
            return Err(ExecutorError::NodeNotFound {
                node: node.fully_qualified_name(),
            });
        }

        let _ = node.notify_guard_condition().set_on_trigger_callback(None);

        let removed: Vec<WiredEntity> = {
            let mut entities = self.entities.lock();
            let ids: Vec<EntityId> = entities
                .iter()
                .filter(|(_, wired)| wired.node == node.id())
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| entities.remove(id)).collect()
        };
        for wired in removed {
            wired.entity.set_callback(None);
        }
        for group in node.callback_groups() {
            for timer in group.timers() {
                self.timers.remove_timer(&timer);
            }
        }
        node.disassociate();

        tracing::debug!(node = %node.fully_qualified_name(), "node removed from executor");
        self.bus.publish(
            Event::new(EventKind::NodeRemoved).with_node(node.fully_qualified_name()),
        );
        Ok(())
    }

    /// Rebuilds the entity map from the live nodes.
    pub fn execute(&self) {
        let _rebuild = self.rebuild.lock();
        self.timers.clear_all();

        let nodes: Vec<Arc<Node>> = {
            let mut nodes = self.nodes.lock();
            nodes.retain(|w| w.strong_count() > 0);
            nodes.iter().filter_map(Weak::upgrade).collect()
        };

        let mut fresh = HashMap::new();
        for node in &nodes {
            fresh.extend(self.wire_node(node));
        }

        let (stale, count) = {
            let mut entities = self.entities.lock();
            let old = std::mem::replace(&mut *entities, fresh);
            let stale: Vec<WiredEntity> = old
                .into_iter()
                .filter(|(id, _)| !entities.contains_key(id))
                .map(|(_, wired)| wired)
                .collect();
            (stale, entities.len())
        };
        for wired in stale {
            wired.entity.set_callback(None);
        }

        let count = count + self.timers.len();
        tracing::trace!(nodes = nodes.len(), entities = count, "entities rebuilt");
        self.bus
            .publish(Event::new(EventKind::EntitiesRebuilt).with_count(count));
    }

    /// Weak handle of a wired entity, `None` if it is not (or no longer) wired.
    pub(crate) fn lookup(&self, id: EntityId) -> Option<WiredEntity> {
        self.entities.lock().get(&id).cloned()
    }

    pub fn has_node(&self, node: &Arc<Node>) -> bool {
        self.nodes
            .lock()
            .iter()
            .any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(node)))
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Number of wired entities, timers excluded.
    pub fn entity_count(&self) -> usize {
        self.entities.lock().len()
    }

    /// Installs callbacks on every entity of `node` and registers its timers.
    ///
    /// Called under the rebuild lock only, never under the map locks: binding may
    /// replay pending work into the ready queue.
    fn wire_node(&self, node: &Arc<Node>) -> Vec<(EntityId, WiredEntity)> {
        let Some(ready) = self.ready.upgrade() else {
            return Vec::new();
        };
        let node_id = node.id();
        let mut wired = Vec::new();
        let mut bind = |id: EntityId, entity: WeakEntity| {
            let callback = EventsCallback::new(
                &ready,
                ExecutorEvent {
                    entity: id,
                    kind: entity.event_type(),
                    node: Some(node_id),
                },
            );
            entity.set_callback(Some(callback));
            wired.push((id, WiredEntity { node: node_id, entity }));
        };

        for group in node.callback_groups() {
            if !group.can_be_taken_from() {
                continue;
            }
            for timer in group.timers() {
                self.timers.add_timer(&timer);
            }
            for subscription in group.subscriptions() {
                bind(
                    subscription.entity_id(),
                    WeakEntity::Subscription(Arc::downgrade(&subscription)),
                );
            }
            for service in group.services() {
                bind(service.entity_id(), WeakEntity::Service(Arc::downgrade(&service)));
            }
            for client in group.clients() {
                bind(client.entity_id(), WeakEntity::Client(Arc::downgrade(&client)));
            }
            for waitable in group.waitables() {
                bind(waitable.entity_id(), WeakEntity::Waitable(Arc::downgrade(&waitable)));
            }
        }
        wired
    }
}

impl Drop for EntitiesCollector {
    fn drop(&mut self) {
        for wired in self.entities.get_mut().values() {
            wired.entity.set_callback(None);
        }
        for node in self.nodes.get_mut().iter().filter_map(Weak::upgrade) {
            let _ = node.notify_guard_condition().set_on_trigger_callback(None);
            node.disassociate();
        }
    }
}

impl std::fmt::Debug for EntitiesCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitiesCollector")
            .field("nodes", &self.node_count())
            .field("entities", &self.entity_count())
            .finish()
    }
}

//! Intra-process base for action servers.
//!
//! Goal, cancel and result channels of an intra-process action server are signalled
//! through one guard condition. The adapter gives them the ordinary waitable contract:
//! wait-set registration goes through that guard condition, and executor binding is
//! the guard condition's on-trigger callback.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::Context;
use crate::core::EventsCallback;
use crate::entities::{EntityId, ExecutableEntity, Waitable};
use crate::error::ExecutorError;
use crate::qos::QoS;
use crate::signal::{GuardCondition, WaitSet};

type ReadyHandler = Box<dyn FnMut() + Send>;

/// Waitable adapter of an intra-process action server.
pub struct ActionServerIntraProcessBase {
    id: EntityId,
    action_name: String,
    qos: QoS,
    guard_condition: Arc<GuardCondition>,
    on_ready: Mutex<ReadyHandler>,
}

impl ActionServerIntraProcessBase {
    /// Creates the adapter; `on_ready` runs once per dispatched notification.
    pub fn new<F>(context: &Arc<Context>, action_name: &str, qos: QoS, on_ready: F) -> Arc<Self>
    where
        F: FnMut() + Send + 'static,
    {
        Arc::new(Self {
            id: EntityId::next(),
            action_name: action_name.to_string(),
            qos,
            guard_condition: GuardCondition::new(context),
            on_ready: Mutex::new(Box::new(on_ready)),
        })
    }

    pub fn get_action_name(&self) -> &str {
        &self.action_name
    }

    pub fn get_actual_qos(&self) -> QoS {
        self.qos
    }

    /// Signals that goal, cancel or result data is available.
    pub fn notify(&self) -> Result<(), ExecutorError> {
        self.guard_condition.trigger()
    }

    pub fn guard_condition(&self) -> &Arc<GuardCondition> {
        &self.guard_condition
    }
}

impl ExecutableEntity for ActionServerIntraProcessBase {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    /// Binding fails only on a shut-down context. The trait cannot return the error,
    /// so it is logged and the adapter stays unbound; the failure reaches callers
    /// through [`notify`](Self::notify), which reports the same condition.
    fn set_events_executor_callback(&self, callback: Option<EventsCallback>) {
        if let Err(e) = self.guard_condition.set_on_trigger_callback(callback) {
            tracing::warn!(action = %self.action_name, error = %e, "action server not bound");
        }
    }

    fn execute(&self) {
        self.guard_condition.take_triggered();
        (self.on_ready.lock())();
    }
}

impl Waitable for ActionServerIntraProcessBase {
    fn add_to_wait_set(&self, wait_set: &mut WaitSet) -> Result<(), ExecutorError> {
        wait_set.add_guard_condition(Arc::clone(&self.guard_condition));
        Ok(())
    }

    fn is_ready(&self, wait_set: &WaitSet) -> Result<bool, ExecutorError> {
        Ok(wait_set.is_triggered(&self.guard_condition))
    }
}

impl fmt::Debug for ActionServerIntraProcessBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionServerIntraProcessBase")
            .field("id", &self.id)
            .field("action_name", &self.action_name)
            .finish()
    }
}

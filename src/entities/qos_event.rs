//! # QoS event handlers.
//!
//! Every publisher and subscription carries one incompatible-QoS handler. The
//! middleware reports a mismatch when a counterpart with incompatible QoS appears;
//! the handler accumulates the status and pushes an event, and the executor later
//! runs the user callback (or the default warning) with the accumulated status.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::EventsCallback;
use crate::qos::QosPolicyKind;

use super::{EntityId, ExecutableEntity, ListenerSlot, Waitable};

/// Which side of a mismatch the handler reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QosEventKind {
    /// Publisher side: a subscription requested QoS this publisher does not offer.
    OfferedIncompatibleQos,
    /// Subscription side: a publisher offers QoS below what this subscription requests.
    RequestedIncompatibleQos,
}

/// Accumulated incompatible-QoS status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompatibleQosStatus {
    /// Mismatches seen since creation.
    pub total_count: u32,
    /// Mismatches since the callback last ran.
    pub total_count_change: u32,
    pub last_policy_kind: QosPolicyKind,
}

impl Default for IncompatibleQosStatus {
    fn default() -> Self {
        Self {
            total_count: 0,
            total_count_change: 0,
            last_policy_kind: QosPolicyKind::Invalid,
        }
    }
}

/// User callback for incompatible-QoS events.
pub type IncompatibleQosCallback = Arc<dyn Fn(&IncompatibleQosStatus) + Send + Sync>;

/// Waitable delivering incompatible-QoS events of one endpoint.
pub struct QosEventHandler {
    id: EntityId,
    kind: QosEventKind,
    topic: String,
    callback: Option<IncompatibleQosCallback>,
    status: Mutex<IncompatibleQosStatus>,
    listener: ListenerSlot,
}

impl QosEventHandler {
    pub(crate) fn new(
        kind: QosEventKind,
        topic: &str,
        callback: Option<IncompatibleQosCallback>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: EntityId::next(),
            kind,
            topic: topic.to_string(),
            callback,
            status: Mutex::new(IncompatibleQosStatus::default()),
            listener: ListenerSlot::new(),
        })
    }

    pub fn kind(&self) -> QosEventKind {
        self.kind
    }

    /// Snapshot of the accumulated status.
    pub fn status(&self) -> IncompatibleQosStatus {
        *self.status.lock()
    }

    pub(crate) fn on_incompatible(&self, policy: QosPolicyKind) {
        {
            let mut status = self.status.lock();
            status.total_count += 1;
            status.total_count_change += 1;
            status.last_policy_kind = policy;
        }
        self.listener.notify();
    }

    fn default_callback(&self, status: &IncompatibleQosStatus) {
        match self.kind {
            QosEventKind::OfferedIncompatibleQos => tracing::warn!(
                "New subscription discovered on topic '{}', requesting incompatible QoS. \
                 No messages will be sent to it. Last incompatible policy: {}",
                self.topic,
                status.last_policy_kind
            ),
            QosEventKind::RequestedIncompatibleQos => tracing::warn!(
                "New publisher discovered on topic '{}', offering incompatible QoS. \
                 No messages will be received from it. Last incompatible policy: {}",
                self.topic,
                status.last_policy_kind
            ),
        }
    }
}

impl ExecutableEntity for QosEventHandler {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn set_events_executor_callback(&self, callback: Option<EventsCallback>) {
        self.listener.set(callback);
    }

    fn execute(&self) {
        let snapshot = {
            let mut status = self.status.lock();
            if status.total_count_change == 0 {
                return;
            }
            let snapshot = *status;
            status.total_count_change = 0;
            snapshot
        };
        match &self.callback {
            Some(cb) => cb(&snapshot),
            None => self.default_callback(&snapshot),
        }
    }
}

impl Waitable for QosEventHandler {}

impl fmt::Debug for QosEventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QosEventHandler")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("topic", &self.topic)
            .finish()
    }
}

//! # Intra-process subscription companion.
//!
//! Receives messages directly from the [`IntraProcessManager`](super::IntraProcessManager),
//! stores them in an [`IntraProcessBuffer`] and pushes one executor event per accepted
//! message. It is purely event driven and refuses the wait-set contract.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::EventsCallback;
use crate::entities::{EntityId, ExecutableEntity, ListenerSlot, Waitable};
use crate::entities::MessageCallback;
use crate::error::ExecutorError;
use crate::middleware::Payload;
use crate::qos::QoS;
use crate::signal::WaitSet;

use super::{IntraProcessBuffer, IntraProcessBufferType};

/// Type-erased view used by the manager.
pub trait SubscriptionIntraProcessBase: Waitable {
    fn topic_name(&self) -> &str;
    fn qos(&self) -> QoS;

    /// Offers a message; returns `true` if it was buffered.
    fn provide_intra_process_message(&self, payload: Payload) -> bool;

    fn as_waitable(self: Arc<Self>) -> Arc<dyn Waitable>;
}

/// Intra-process receiving side of a `Subscription<M>`.
pub struct SubscriptionIntraProcess<M> {
    id: EntityId,
    topic: String,
    qos: QoS,
    buffer: Mutex<IntraProcessBuffer<Arc<M>>>,
    callback: Arc<Mutex<MessageCallback<M>>>,
    listener: ListenerSlot,
}

impl<M> SubscriptionIntraProcess<M>
where
    M: Send + Sync + 'static,
{
    pub(crate) fn new(
        topic: &str,
        qos: QoS,
        buffer_type: IntraProcessBufferType,
        callback: Arc<Mutex<MessageCallback<M>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: EntityId::next(),
            topic: topic.to_string(),
            qos,
            buffer: Mutex::new(IntraProcessBuffer::new(qos.depth, buffer_type)),
            callback,
            listener: ListenerSlot::new(),
        })
    }

    /// Messages buffered and not dispatched yet.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl<M> ExecutableEntity for SubscriptionIntraProcess<M>
where
    M: Send + Sync + 'static,
{
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn set_events_executor_callback(&self, callback: Option<EventsCallback>) {
        self.listener.set(callback);
    }

    fn execute(&self) {
        let message = self.buffer.lock().consume();
        if let Some(message) = message {
            (self.callback.lock())(message);
        }
    }
}

impl<M> Waitable for SubscriptionIntraProcess<M>
where
    M: Send + Sync + 'static,
{
    fn add_to_wait_set(&self, _wait_set: &mut WaitSet) -> Result<(), ExecutorError> {
        Err(ExecutorError::WaitSetUnsupported {
            entity: "intra-process subscription",
        })
    }

    fn is_ready(&self, _wait_set: &WaitSet) -> Result<bool, ExecutorError> {
        Err(ExecutorError::WaitSetUnsupported {
            entity: "intra-process subscription",
        })
    }
}

impl<M> SubscriptionIntraProcessBase for SubscriptionIntraProcess<M>
where
    M: Send + Sync + 'static,
{
    fn topic_name(&self) -> &str {
        &self.topic
    }

    fn qos(&self) -> QoS {
        self.qos
    }

    fn provide_intra_process_message(&self, payload: Payload) -> bool {
        let Ok(message) = payload.downcast::<M>() else {
            tracing::warn!(topic = %self.topic, "intra-process message of unexpected type");
            return false;
        };
        let accepted = self.buffer.lock().add(message);
        if accepted {
            self.listener.notify();
        }
        accepted
    }

    fn as_waitable(self: Arc<Self>) -> Arc<dyn Waitable> {
        self
    }
}

impl<M> fmt::Debug for SubscriptionIntraProcess<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionIntraProcess")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

//! # Typed publisher.
//!
//! A [`Publisher<M>`] always owns a transport-level endpoint. When intra-process
//! delivery is enabled it additionally holds its manager id, and every publication is
//! handed to the manager first, then to the transport for everyone else.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::context::Context;
use crate::error::ExecutorError;
use crate::intra_process::IntraProcessManager;
use crate::middleware::{Payload, RawPublisher};
use crate::node::PublisherOptions;
use crate::qos::QoS;

use super::{QosEventHandler, QosEventKind, Waitable};

/// Intra-process registration of an endpoint.
struct IntraProcessSetup {
    id: u64,
    manager: Arc<IntraProcessManager>,
}

/// Type-erased view of a publisher.
pub trait PublisherBase: Send + Sync {
    fn topic_name(&self) -> &str;
    fn qos(&self) -> QoS;
    /// Transport-level identifier.
    fn gid(&self) -> u64;
    /// Intra-process manager id, `None` when publishing only through the transport.
    fn intra_process_id(&self) -> Option<u64>;
    /// QoS event waitables to register in the publisher's callback group.
    fn event_handlers(&self) -> Vec<Arc<dyn Waitable>>;
    /// Number of subscriptions reachable through the transport.
    fn subscription_count(&self) -> usize;
}

/// Publisher of messages of type `M`.
pub struct Publisher<M> {
    context: Arc<Context>,
    raw: Arc<RawPublisher>,
    qos_handler: Arc<QosEventHandler>,
    intra_process: OnceLock<IntraProcessSetup>,
    _message: PhantomData<fn(M)>,
}

impl<M> Publisher<M>
where
    M: Send + Sync + 'static,
{
    pub(crate) fn new(context: &Arc<Context>, topic: &str, options: &PublisherOptions) -> Arc<Self> {
        let qos_handler = QosEventHandler::new(
            QosEventKind::OfferedIncompatibleQos,
            topic,
            options.event_callbacks.incompatible_qos.clone(),
        );
        let raw = context.middleware().create_publisher(
            topic,
            options.qos,
            Some(Arc::downgrade(&qos_handler)),
        );
        Arc::new(Self {
            context: Arc::clone(context),
            raw,
            qos_handler,
            intra_process: OnceLock::new(),
            _message: PhantomData,
        })
    }

    /// Publishes one message.
    pub fn publish(&self, message: M) -> Result<(), ExecutorError> {
        self.publish_shared(Arc::new(message))
    }

    /// Publishes an already shared message without copying it.
    pub fn publish_shared(&self, message: Arc<M>) -> Result<(), ExecutorError> {
        self.context.check_valid("failed to publish message")?;
        let payload: Payload = message;
        if let Some(setup) = self.intra_process.get() {
            setup
                .manager
                .do_intra_process_publish(setup.id, Arc::clone(&payload));
        }
        self.context.middleware().publish(&self.raw, payload);
        Ok(())
    }

    /// Number of intra-process subscriptions this publisher reaches.
    pub fn intra_process_subscription_count(&self) -> usize {
        self.intra_process
            .get()
            .map_or(0, |setup| setup.manager.get_subscription_count(setup.id))
    }

    pub(crate) fn setup_intra_process(&self, id: u64, manager: Arc<IntraProcessManager>) {
        self.raw.set_intra_process(true);
        if self.intra_process.set(IntraProcessSetup { id, manager }).is_err() {
            tracing::warn!(topic = %self.raw.topic, "intra-process already set up for publisher");
        }
    }
}

impl<M> PublisherBase for Publisher<M>
where
    M: Send + Sync + 'static,
{
    fn topic_name(&self) -> &str {
        &self.raw.topic
    }

    fn qos(&self) -> QoS {
        self.raw.qos
    }

    fn gid(&self) -> u64 {
        self.raw.gid
    }

    fn intra_process_id(&self) -> Option<u64> {
        self.intra_process.get().map(|setup| setup.id)
    }

    fn event_handlers(&self) -> Vec<Arc<dyn Waitable>> {
        vec![Arc::clone(&self.qos_handler) as Arc<dyn Waitable>]
    }

    fn subscription_count(&self) -> usize {
        self.context.middleware().subscription_count(&self.raw.topic)
    }
}

impl<M> Drop for Publisher<M> {
    fn drop(&mut self) {
        if let Some(setup) = self.intra_process.get() {
            setup.manager.remove_by_id(setup.id);
        }
    }
}

impl<M> fmt::Debug for Publisher<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.raw.topic)
            .field("qos", &self.raw.qos)
            .field("intra_process_id", &self.intra_process.get().map(|s| s.id))
            .finish()
    }
}

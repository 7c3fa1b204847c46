//! # Typed subscription.
//!
//! A [`Subscription<M>`] receives through its transport endpoint. With intra-process
//! delivery enabled it also owns a [`SubscriptionIntraProcess<M>`] companion, which
//! is registered as a separate waitable and shares the user callback.

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::context::Context;
use crate::core::EventsCallback;
use crate::intra_process::{IntraProcessManager, SubscriptionIntraProcess};
use crate::middleware::RawSubscription;
use crate::node::SubscriptionOptions;
use crate::qos::QoS;

use super::{EntityId, ExecutableEntity, QosEventHandler, QosEventKind, Waitable};

/// Boxed message callback.
pub type MessageCallback<M> = Box<dyn FnMut(Arc<M>) + Send>;

/// Callback shared between a subscription and its intra-process companion.
pub(crate) type SharedCallback<M> = Arc<Mutex<MessageCallback<M>>>;

pub(crate) fn shared_callback<M, F>(callback: F) -> SharedCallback<M>
where
    F: FnMut(Arc<M>) + Send + 'static,
{
    Arc::new(Mutex::new(Box::new(callback)))
}

/// Type-erased view of a subscription.
pub trait SubscriptionBase: ExecutableEntity {
    fn topic_name(&self) -> &str;
    fn qos(&self) -> QoS;
    /// Intra-process manager id, `None` when receiving only through the transport.
    fn intra_process_id(&self) -> Option<u64>;
    /// QoS event waitables to register in the subscription's callback group.
    fn event_handlers(&self) -> Vec<Arc<dyn Waitable>>;
}

struct SubscriptionIntraProcessSetup<M> {
    id: u64,
    manager: Arc<IntraProcessManager>,
    waitable: Arc<SubscriptionIntraProcess<M>>,
}

/// Subscription to messages of type `M`.
pub struct Subscription<M> {
    id: EntityId,
    context: Arc<Context>,
    raw: Arc<RawSubscription>,
    callback: SharedCallback<M>,
    qos_handler: Arc<QosEventHandler>,
    intra_process: OnceLock<SubscriptionIntraProcessSetup<M>>,
}

impl<M> Subscription<M>
where
    M: Send + Sync + 'static,
{
    pub(crate) fn new(
        context: &Arc<Context>,
        topic: &str,
        options: &SubscriptionOptions,
        callback: SharedCallback<M>,
    ) -> Arc<Self> {
        let qos_handler = QosEventHandler::new(
            QosEventKind::RequestedIncompatibleQos,
            topic,
            options.event_callbacks.incompatible_qos.clone(),
        );
        let raw = context.middleware().create_subscription(
            topic,
            options.qos,
            Some(Arc::downgrade(&qos_handler)),
        );
        Arc::new(Self {
            id: EntityId::next(),
            context: Arc::clone(context),
            raw,
            callback,
            qos_handler,
            intra_process: OnceLock::new(),
        })
    }

    /// Number of publishers on the topic reachable through the transport.
    pub fn publisher_count(&self) -> usize {
        self.context.middleware().publisher_count(&self.raw.topic)
    }

    /// Transport-level identifier.
    pub fn gid(&self) -> u64 {
        self.raw.gid
    }

    /// The intra-process companion, if intra-process delivery is enabled.
    pub fn intra_process_waitable(&self) -> Option<Arc<SubscriptionIntraProcess<M>>> {
        self.intra_process
            .get()
            .map(|setup| Arc::clone(&setup.waitable))
    }

    pub(crate) fn setup_intra_process(
        &self,
        id: u64,
        manager: Arc<IntraProcessManager>,
        waitable: Arc<SubscriptionIntraProcess<M>>,
    ) {
        self.raw.set_intra_process(true);
        let setup = SubscriptionIntraProcessSetup {
            id,
            manager,
            waitable,
        };
        if self.intra_process.set(setup).is_err() {
            tracing::warn!(topic = %self.raw.topic, "intra-process already set up for subscription");
        }
    }
}

impl<M> ExecutableEntity for Subscription<M>
where
    M: Send + Sync + 'static,
{
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn set_events_executor_callback(&self, callback: Option<EventsCallback>) {
        self.raw.set_listener(callback);
    }

    fn execute(&self) {
        let Some(payload) = self.raw.take() else {
            return;
        };
        match payload.downcast::<M>() {
            Ok(message) => (self.callback.lock())(message),
            Err(_) => tracing::warn!(
                topic = %self.raw.topic,
                "dropping message of unexpected type"
            ),
        }
    }
}

impl<M> SubscriptionBase for Subscription<M>
where
    M: Send + Sync + 'static,
{
    fn topic_name(&self) -> &str {
        &self.raw.topic
    }

    fn qos(&self) -> QoS {
        self.raw.qos
    }

    fn intra_process_id(&self) -> Option<u64> {
        self.intra_process.get().map(|setup| setup.id)
    }

    fn event_handlers(&self) -> Vec<Arc<dyn Waitable>> {
        vec![Arc::clone(&self.qos_handler) as Arc<dyn Waitable>]
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        if let Some(setup) = self.intra_process.get() {
            setup.manager.remove_by_id(setup.id);
        }
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.raw.topic)
            .field("qos", &self.raw.qos)
            .finish()
    }
}

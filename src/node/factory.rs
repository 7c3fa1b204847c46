//! Endpoint factories used by [`NodeTopics`](super::NodeTopics).
//!
//! A factory captures everything type-specific about an endpoint (message type,
//! user callback) so topic registration itself stays generic.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::entities::{Publisher, SharedCallback, Subscription, shared_callback};
use crate::intra_process::{IntraProcessBufferType, SubscriptionIntraProcess};
use crate::qos::QoS;

use super::{PublisherOptions, SubscriptionOptions};

/// Builds publishers of `M`.
pub struct PublisherFactory<M> {
    _message: PhantomData<fn(M)>,
}

impl<M> Default for PublisherFactory<M> {
    fn default() -> Self {
        Self {
            _message: PhantomData,
        }
    }
}

impl<M> PublisherFactory<M>
where
    M: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_typed_publisher(
        &self,
        context: &Arc<Context>,
        topic: &str,
        options: &PublisherOptions,
    ) -> Arc<Publisher<M>> {
        Publisher::new(context, topic, options)
    }
}

/// Builds subscriptions of `M` and their intra-process companions, all sharing one
/// user callback.
pub struct SubscriptionFactory<M> {
    callback: SharedCallback<M>,
}

impl<M> SubscriptionFactory<M>
where
    M: Send + Sync + 'static,
{
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(Arc<M>) + Send + 'static,
    {
        Self {
            callback: shared_callback(callback),
        }
    }

    pub fn create_typed_subscription(
        &self,
        context: &Arc<Context>,
        topic: &str,
        options: &SubscriptionOptions,
    ) -> Arc<Subscription<M>> {
        Subscription::new(context, topic, options, Arc::clone(&self.callback))
    }

    pub fn create_typed_subscription_intra_process(
        &self,
        topic: &str,
        qos: QoS,
        buffer_type: IntraProcessBufferType,
    ) -> Arc<SubscriptionIntraProcess<M>> {
        SubscriptionIntraProcess::new(topic, qos, buffer_type, Arc::clone(&self.callback))
    }
}

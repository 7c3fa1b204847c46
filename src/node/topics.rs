//! # Topic registration.
//!
//! Creating an endpoint is split in two steps, like every other node component:
//!
//! ```text
//! create_publisher / create_subscription      add_publisher / add_subscription
//!   QoS gate (intra-process only)               resolve callback group
//!   factory builds the endpoint                 register QoS event waitables
//!   register with the intra-process manager     register intra-process companion
//!                                               trigger the node guard condition
//! ```
//!
//! The QoS gate runs before anything is created, so a refused intra-process request
//! leaves no trace in the manager or the middleware.

use std::sync::{Arc, Weak};

use crate::entities::{Publisher, PublisherBase, Subscription, SubscriptionBase};
use crate::error::ExecutorError;
use crate::intra_process::IntraProcessBufferType;

use super::{
    CallbackGroup, Node, PublisherFactory, PublisherOptions, SubscriptionFactory,
    SubscriptionOptions,
};

/// Topic component of a [`Node`].
#[derive(Debug, Clone, Copy)]
pub struct NodeTopics<'a> {
    node: &'a Node,
}

impl<'a> NodeTopics<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// Expands a relative or private (`~/`) topic name against the node.
    pub fn resolve_topic_name(&self, topic: &str) -> String {
        self.node.resolve_name(topic)
    }

    /// Builds a publisher through `factory`, registering it for intra-process
    /// delivery when `use_intra_process` is set.
    pub fn create_publisher<M>(
        &self,
        topic: &str,
        factory: &PublisherFactory<M>,
        options: &PublisherOptions,
        use_intra_process: bool,
    ) -> Result<Arc<Publisher<M>>, ExecutorError>
    where
        M: Send + Sync + 'static,
    {
        if use_intra_process {
            options.qos.check_intra_process(false)?;
        }
        let context = self.node.context();
        let publisher = factory.create_typed_publisher(context, &self.resolve_topic_name(topic), options);
        if use_intra_process {
            let manager = context.intra_process_manager();
            let id = manager.add_publisher(&publisher);
            publisher.setup_intra_process(id, manager);
            tracing::debug!(topic = %publisher.topic_name(), id, "publisher registered for intra-process");
        }
        Ok(publisher)
    }

    /// Attaches a publisher's event handlers to `group` (or the default group).
    pub fn add_publisher<P>(
        &self,
        publisher: &Arc<P>,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<(), ExecutorError>
    where
        P: PublisherBase + 'static,
    {
        let group = self.node.resolve_group(group, "publisher")?;
        for handler in publisher.event_handlers() {
            group.add_waitable(Arc::downgrade(&handler));
        }
        self.node
            .trigger_notify_guard_condition()
            .map_err(|e| e.with_context("Failed to notify wait set on publisher creation"))
    }

    /// Builds a subscription through `factory`; with `use_intra_process` it also
    /// builds and registers the intra-process companion using `buffer_type`.
    pub fn create_subscription<M>(
        &self,
        topic: &str,
        factory: &SubscriptionFactory<M>,
        options: &SubscriptionOptions,
        use_intra_process: bool,
        buffer_type: IntraProcessBufferType,
    ) -> Result<Arc<Subscription<M>>, ExecutorError>
    where
        M: Send + Sync + 'static,
    {
        if use_intra_process {
            options.qos.check_intra_process(true)?;
        }
        let context = self.node.context();
        let resolved = self.resolve_topic_name(topic);
        let subscription = factory.create_typed_subscription(context, &resolved, options);
        if use_intra_process {
            let companion =
                factory.create_typed_subscription_intra_process(&resolved, options.qos, buffer_type);
            let manager = context.intra_process_manager();
            let id = manager.add_subscription(&companion);
            subscription.setup_intra_process(id, manager, companion);
            tracing::debug!(topic = %resolved, id, "subscription registered for intra-process");
        }
        Ok(subscription)
    }

    /// Attaches a subscription, its event handlers and its intra-process companion
    /// to `group` (or the default group).
    pub fn add_subscription<S>(
        &self,
        subscription: &Arc<S>,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<(), ExecutorError>
    where
        S: SubscriptionBase + 'static,
    {
        let group = self.node.resolve_group(group, "subscription")?;
        let weak = Arc::downgrade(subscription);
        let weak: Weak<dyn SubscriptionBase> = weak;
        group.add_subscription(weak);
        for handler in subscription.event_handlers() {
            group.add_waitable(Arc::downgrade(&handler));
        }
        if let Some(id) = subscription.intra_process_id() {
            match self
                .node
                .context()
                .intra_process_manager()
                .get_subscription_by_id(id)
            {
                Some(companion) => group.add_waitable(Arc::downgrade(&companion.as_waitable())),
                None => tracing::warn!(id, "intra-process companion missing"),
            }
        }
        self.node
            .trigger_notify_guard_condition()
            .map_err(|e| e.with_context("Failed to notify wait set on subscription creation"))
    }
}

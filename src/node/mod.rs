//! # Nodes: the unit an executor schedules.
//!
//! A [`Node`] owns a set of callback groups and a guard condition it triggers whenever
//! its topology changes (an entity or group was added). An executor that owns the node
//! binds that guard condition and rebuilds its wiring on every trigger.
//!
//! ```text
//! Node
//!  ├─ default CallbackGroup ── timers / subscriptions / services / clients / waitables (weak)
//!  ├─ extra CallbackGroups (weak; kept alive by the caller)
//!  ├─ notify GuardCondition ── "topology changed" ──► owning executor rebuilds
//!  └─ associated_with_executor flag (one executor at a time)
//! ```
//!
//! Endpoint creation goes through the node components [`NodeTopics`] and
//! [`NodeServices`]; the `create_*` helpers on [`Node`] combine both steps.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use events_executor::{Context, Node, QoS};
//!
//! let ctx = Context::new();
//! let node = Node::new(&ctx, "talker");
//! let publisher = node.create_publisher::<String>("chatter", QoS::default()).unwrap();
//! let _sub = node
//!     .create_subscription("chatter", QoS::default(), |msg: Arc<String>| println!("{msg}"))
//!     .unwrap();
//! publisher.publish("hello".to_string()).unwrap();
//! assert_eq!(node.fully_qualified_name(), "/talker");
//! ```

mod callback_group;
mod factory;
mod options;
mod services;
mod topics;

pub use callback_group::{CallbackGroup, CallbackGroupType};
pub use factory::{PublisherFactory, SubscriptionFactory};
pub use options::{
    IntraProcessSetting, NodeOptions, PublisherEventCallbacks, PublisherOptions,
    SubscriptionEventCallbacks, SubscriptionOptions,
};
pub use services::NodeServices;
pub use topics::NodeTopics;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::Context;
use crate::entities::{Client, Publisher, Service, Subscription, Timer, Waitable};
use crate::error::ExecutorError;
use crate::qos::QoS;
use crate::signal::GuardCondition;

static NODE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NODE_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Execution unit: named owner of callback groups.
pub struct Node {
    id: NodeId,
    name: String,
    namespace: String,
    context: Arc<Context>,
    options: NodeOptions,
    associated_with_executor: AtomicBool,
    notify_guard_condition: Arc<GuardCondition>,
    callback_groups: Mutex<Vec<Weak<CallbackGroup>>>,
    default_callback_group: Arc<CallbackGroup>,
}

impl Node {
    /// Creates a node in the root namespace.
    pub fn new(context: &Arc<Context>, name: &str) -> Arc<Self> {
        Self::with_options(context, name, NodeOptions::default())
    }

    pub fn with_options(context: &Arc<Context>, name: &str, options: NodeOptions) -> Arc<Self> {
        let namespace = normalize_namespace(&options.namespace);
        let notify_guard_condition = GuardCondition::new(context);
        let default_callback_group = CallbackGroup::new(
            CallbackGroupType::MutuallyExclusive,
            Arc::downgrade(&notify_guard_condition),
        );
        Arc::new(Self {
            id: NodeId::next(),
            name: name.to_string(),
            namespace,
            context: Arc::clone(context),
            options,
            associated_with_executor: AtomicBool::new(false),
            notify_guard_condition,
            callback_groups: Mutex::new(vec![Arc::downgrade(&default_callback_group)]),
            default_callback_group,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fully_qualified_name(&self) -> String {
        if self.namespace == "/" {
            format!("/{}", self.name)
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// True while an executor owns this node.
    pub fn has_executor(&self) -> bool {
        self.associated_with_executor.load(Ordering::Acquire)
    }

    /// Claims the node for an executor; `false` if another one already owns it.
    pub(crate) fn try_associate(&self) -> bool {
        !self.associated_with_executor.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn disassociate(&self) {
        self.associated_with_executor.store(false, Ordering::Release);
    }

    /// Guard condition triggered on every topology change.
    pub fn notify_guard_condition(&self) -> &Arc<GuardCondition> {
        &self.notify_guard_condition
    }

    pub(crate) fn trigger_notify_guard_condition(&self) -> Result<(), ExecutorError> {
        self.notify_guard_condition.trigger()
    }

    /// Creates a new group. The node holds it weakly: keep the returned `Arc`.
    pub fn create_callback_group(&self, kind: CallbackGroupType) -> Arc<CallbackGroup> {
        let group = CallbackGroup::new(kind, Arc::downgrade(&self.notify_guard_condition));
        {
            let mut groups = self.callback_groups.lock();
            groups.retain(|g| g.strong_count() > 0);
            groups.push(Arc::downgrade(&group));
        }
        if let Err(e) = self.trigger_notify_guard_condition() {
            tracing::debug!(node = %self.fully_qualified_name(), error = %e, "callback group added without notify");
        }
        group
    }

    pub fn default_callback_group(&self) -> Arc<CallbackGroup> {
        Arc::clone(&self.default_callback_group)
    }

    pub fn callback_group_in_node(&self, group: &Arc<CallbackGroup>) -> bool {
        self.callback_groups
            .lock()
            .iter()
            .any(|g| g.upgrade().is_some_and(|g| Arc::ptr_eq(&g, group)))
    }

    /// Live callback groups, default group first.
    pub fn callback_groups(&self) -> Vec<Arc<CallbackGroup>> {
        self.callback_groups
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn topics(&self) -> NodeTopics<'_> {
        NodeTopics::new(self)
    }

    pub fn services(&self) -> NodeServices<'_> {
        NodeServices::new(self)
    }

    pub(crate) fn resolve_group(
        &self,
        group: Option<&Arc<CallbackGroup>>,
        entity: &'static str,
    ) -> Result<Arc<CallbackGroup>, ExecutorError> {
        match group {
            Some(group) if self.callback_group_in_node(group) => Ok(Arc::clone(group)),
            Some(_) => Err(ExecutorError::CallbackGroupNotInNode { entity }),
            None => Ok(self.default_callback_group()),
        }
    }

    /// Expands `name`: absolute names are kept, `~/x` is relative to the node,
    /// anything else is relative to the namespace.
    pub(crate) fn resolve_name(&self, name: &str) -> String {
        if name.starts_with('/') {
            name.to_string()
        } else if let Some(private) = name.strip_prefix("~/") {
            format!("{}/{}", self.fully_qualified_name(), private)
        } else if self.namespace == "/" {
            format!("/{name}")
        } else {
            format!("{}/{}", self.namespace, name)
        }
    }

    /// Creates a periodic timer in `group` (default group if `None`).
    pub fn create_wall_timer<F>(
        &self,
        period: Duration,
        callback: F,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<Arc<Timer>, ExecutorError>
    where
        F: FnMut() + Send + 'static,
    {
        let group = self.resolve_group(group, "timer")?;
        let timer = Timer::new(period, callback);
        group.add_timer(&timer);
        self.trigger_notify_guard_condition()
            .map_err(|e| e.with_context("Failed to notify wait set on timer creation"))?;
        Ok(timer)
    }

    pub fn create_publisher<M>(&self, topic: &str, qos: QoS) -> Result<Arc<Publisher<M>>, ExecutorError>
    where
        M: Send + Sync + 'static,
    {
        self.create_publisher_with_options(topic, PublisherOptions::with_qos(qos))
    }

    pub fn create_publisher_with_options<M>(
        &self,
        topic: &str,
        options: PublisherOptions,
    ) -> Result<Arc<Publisher<M>>, ExecutorError>
    where
        M: Send + Sync + 'static,
    {
        let use_intra_process = options
            .use_intra_process_comm
            .resolve(self.options.use_intra_process_comms);
        let topics = self.topics();
        let publisher =
            topics.create_publisher(topic, &PublisherFactory::new(), &options, use_intra_process)?;
        topics.add_publisher(&publisher, options.callback_group.as_ref())?;
        Ok(publisher)
    }

    pub fn create_subscription<M, F>(
        &self,
        topic: &str,
        qos: QoS,
        callback: F,
    ) -> Result<Arc<Subscription<M>>, ExecutorError>
    where
        M: Send + Sync + 'static,
        F: FnMut(Arc<M>) + Send + 'static,
    {
        self.create_subscription_with_options(topic, SubscriptionOptions::with_qos(qos), callback)
    }

    pub fn create_subscription_with_options<M, F>(
        &self,
        topic: &str,
        options: SubscriptionOptions,
        callback: F,
    ) -> Result<Arc<Subscription<M>>, ExecutorError>
    where
        M: Send + Sync + 'static,
        F: FnMut(Arc<M>) + Send + 'static,
    {
        let use_intra_process = options
            .use_intra_process_comm
            .resolve(self.options.use_intra_process_comms);
        let buffer_type = options
            .intra_process_buffer_type
            .unwrap_or(self.options.intra_process_buffer);
        let topics = self.topics();
        let subscription = topics.create_subscription(
            topic,
            &SubscriptionFactory::new(callback),
            &options,
            use_intra_process,
            buffer_type,
        )?;
        topics.add_subscription(&subscription, options.callback_group.as_ref())?;
        Ok(subscription)
    }

    /// Creates a service in the default group.
    pub fn create_service<Req, Res, F>(
        &self,
        name: &str,
        handler: F,
    ) -> Result<Arc<Service<Req, Res>>, ExecutorError>
    where
        Req: Send + Sync + 'static,
        Res: Send + Sync + 'static,
        F: FnMut(Arc<Req>) -> Res + Send + 'static,
    {
        let services = self.services();
        let service = Service::new(&self.context, &services.resolve_service_name(name), handler)?;
        services.add_service(&service, None)?;
        Ok(service)
    }

    /// Creates a client in the default group.
    pub fn create_client<Req, Res>(&self, service_name: &str) -> Result<Arc<Client<Req, Res>>, ExecutorError>
    where
        Req: Send + Sync + 'static,
        Res: Send + Sync + 'static,
    {
        let services = self.services();
        let client = Client::new(&self.context, &services.resolve_service_name(service_name));
        services.add_client(&client, None)?;
        Ok(client)
    }

    /// Adds a user waitable to `group` (default group if `None`).
    pub fn add_waitable(
        &self,
        waitable: &Arc<dyn Waitable>,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<(), ExecutorError> {
        let group = self.resolve_group(group, "waitable")?;
        group.add_waitable(Arc::downgrade(waitable));
        self.trigger_notify_guard_condition()
            .map_err(|e| e.with_context("Failed to notify wait set on waitable creation"))
    }
}

fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.fully_qualified_name())
            .field("has_executor", &self.has_executor())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_resolve_against_namespace() {
        let ctx = Context::new();
        let root = Node::new(&ctx, "talker");
        assert_eq!(root.fully_qualified_name(), "/talker");
        assert_eq!(root.resolve_name("chatter"), "/chatter");
        assert_eq!(root.resolve_name("~/status"), "/talker/status");

        let nested = Node::with_options(&ctx, "talker", NodeOptions::default().namespace("robot/"));
        assert_eq!(nested.namespace(), "/robot");
        assert_eq!(nested.fully_qualified_name(), "/robot/talker");
        assert_eq!(nested.resolve_name("chatter"), "/robot/chatter");
        assert_eq!(nested.resolve_name("/abs"), "/abs");
    }

    #[test]
    fn test_ownership_flag_is_exclusive() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "n");
        assert!(node.try_associate());
        assert!(!node.try_associate());
        assert!(node.has_executor());
        node.disassociate();
        assert!(node.try_associate());
    }

    #[test]
    fn test_callback_groups_are_weak() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "n");
        let extra = node.create_callback_group(CallbackGroupType::Reentrant);
        assert_eq!(node.callback_groups().len(), 2);
        assert!(node.callback_group_in_node(&extra));
        assert!(node.notify_guard_condition().take_triggered());

        drop(extra);
        assert_eq!(node.callback_groups().len(), 1);
        assert!(Arc::ptr_eq(&node.callback_groups()[0], &node.default_callback_group()));
    }

    #[test]
    fn test_create_helpers_join_default_group() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "n");
        let _timer = node
            .create_wall_timer(Duration::from_millis(10), || {}, None)
            .unwrap();
        let _sub = node
            .create_subscription("t", QoS::default(), |_m: Arc<u32>| {})
            .unwrap();
        let _pub = node.create_publisher::<u32>("t", QoS::default()).unwrap();

        let group = node.default_callback_group();
        assert_eq!(group.timers().len(), 1);
        assert_eq!(group.subscriptions().len(), 1);
        // one incompatible-QoS handler per endpoint
        assert_eq!(group.waitables().len(), 2);
    }

    #[test]
    fn test_intra_process_default_comes_from_node() {
        let ctx = Context::new();
        let node = Node::with_options(&ctx, "n", NodeOptions::default().use_intra_process_comms(true));
        let sub = node
            .create_subscription("t", QoS::default(), |_m: Arc<u32>| {})
            .unwrap();
        assert!(sub.intra_process_waitable().is_some());

        let opted_out = node
            .create_subscription_with_options(
                "t",
                SubscriptionOptions {
                    use_intra_process_comm: IntraProcessSetting::Disable,
                    ..SubscriptionOptions::default()
                },
                |_m: Arc<u32>| {},
            )
            .unwrap();
        assert!(opted_out.intra_process_waitable().is_none());
    }
}

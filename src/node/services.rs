//! Service and client registration.

use std::sync::{Arc, Weak};

use crate::entities::{ClientBase, ServiceBase};
use crate::error::ExecutorError;

use super::{CallbackGroup, Node};

/// Service component of a [`Node`].
#[derive(Debug, Clone, Copy)]
pub struct NodeServices<'a> {
    node: &'a Node,
}

impl<'a> NodeServices<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// Expands a relative or private (`~/`) service name against the node.
    pub fn resolve_service_name(&self, name: &str) -> String {
        self.node.resolve_name(name)
    }

    pub fn add_service<S>(
        &self,
        service: &Arc<S>,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<(), ExecutorError>
    where
        S: ServiceBase + 'static,
    {
        let group = self.node.resolve_group(group, "service")?;
        let weak = Arc::downgrade(service);
        let weak: Weak<dyn ServiceBase> = weak;
        group.add_service(weak);
        self.node
            .trigger_notify_guard_condition()
            .map_err(|e| e.with_context("Failed to notify wait set on service creation"))
    }

    pub fn add_client<C>(
        &self,
        client: &Arc<C>,
        group: Option<&Arc<CallbackGroup>>,
    ) -> Result<(), ExecutorError>
    where
        C: ClientBase + 'static,
    {
        let group = self.node.resolve_group(group, "client")?;
        let weak = Arc::downgrade(client);
        let weak: Weak<dyn ClientBase> = weak;
        group.add_client(weak);
        self.node
            .trigger_notify_guard_condition()
            .map_err(|e| e.with_context("Failed to notify wait set on client creation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::entities::{Client, Service};
    use crate::node::NodeOptions;

    #[test]
    fn test_resolve_service_name() {
        let ctx = Context::new();
        let node = Node::with_options(&ctx, "adder", NodeOptions::default().namespace("/math"));
        let services = node.services();
        assert_eq!(services.resolve_service_name("add"), "/math/add");
        assert_eq!(services.resolve_service_name("/add"), "/add");
        assert_eq!(services.resolve_service_name("~/reset"), "/math/adder/reset");
    }

    #[test]
    fn test_add_service_and_client_to_default_group() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "n");
        let service = Service::<u32, u32>::new(&ctx, "/double", |r: Arc<u32>| *r * 2).unwrap();
        let client = Client::<u32, u32>::new(&ctx, "/double");

        node.services().add_service(&service, None).unwrap();
        node.services().add_client(&client, None).unwrap();

        let group = node.default_callback_group();
        assert_eq!(group.services().len(), 1);
        assert_eq!(group.clients().len(), 1);
        assert!(client.service_is_ready());
    }
}

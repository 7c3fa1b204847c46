//! Node and endpoint options.

use std::fmt;
use std::sync::Arc;

use crate::entities::IncompatibleQosCallback;
use crate::intra_process::IntraProcessBufferType;
use crate::qos::QoS;

use super::CallbackGroup;

/// Node-wide settings.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// Namespace the node lives in; `/` is the root.
    pub namespace: String,
    /// Default for endpoints created with [`IntraProcessSetting::NodeDefault`].
    pub use_intra_process_comms: bool,
    /// Default buffer type of intra-process subscriptions.
    pub intra_process_buffer: IntraProcessBufferType,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            namespace: "/".to_string(),
            use_intra_process_comms: false,
            intra_process_buffer: IntraProcessBufferType::default(),
        }
    }
}

impl NodeOptions {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn use_intra_process_comms(mut self, enabled: bool) -> Self {
        self.use_intra_process_comms = enabled;
        self
    }
}

/// Per-endpoint intra-process switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntraProcessSetting {
    /// Follow [`NodeOptions::use_intra_process_comms`].
    #[default]
    NodeDefault,
    Enable,
    Disable,
}

impl IntraProcessSetting {
    /// Resolves the setting against the node default.
    pub fn resolve(self, node_default: bool) -> bool {
        match self {
            IntraProcessSetting::NodeDefault => node_default,
            IntraProcessSetting::Enable => true,
            IntraProcessSetting::Disable => false,
        }
    }
}

/// Event callbacks of a publisher.
#[derive(Clone, Default)]
pub struct PublisherEventCallbacks {
    /// Replaces the default warning on offered-incompatible-QoS events.
    pub incompatible_qos: Option<IncompatibleQosCallback>,
}

/// Event callbacks of a subscription.
#[derive(Clone, Default)]
pub struct SubscriptionEventCallbacks {
    /// Replaces the default warning on requested-incompatible-QoS events.
    pub incompatible_qos: Option<IncompatibleQosCallback>,
}

impl fmt::Debug for PublisherEventCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherEventCallbacks")
            .field("incompatible_qos", &self.incompatible_qos.is_some())
            .finish()
    }
}

impl fmt::Debug for SubscriptionEventCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEventCallbacks")
            .field("incompatible_qos", &self.incompatible_qos.is_some())
            .finish()
    }
}

/// Publisher creation options.
#[derive(Debug, Clone, Default)]
pub struct PublisherOptions {
    pub qos: QoS,
    pub use_intra_process_comm: IntraProcessSetting,
    /// Group the publisher's event handlers join; `None` = node default group.
    pub callback_group: Option<Arc<CallbackGroup>>,
    pub event_callbacks: PublisherEventCallbacks,
}

impl PublisherOptions {
    pub fn with_qos(qos: QoS) -> Self {
        Self {
            qos,
            ..Self::default()
        }
    }
}

/// Subscription creation options.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionOptions {
    pub qos: QoS,
    pub use_intra_process_comm: IntraProcessSetting,
    /// Group the subscription joins; `None` = node default group.
    pub callback_group: Option<Arc<CallbackGroup>>,
    pub event_callbacks: SubscriptionEventCallbacks,
    /// Intra-process buffer type; `None` = node default.
    pub intra_process_buffer_type: Option<IntraProcessBufferType>,
}

impl SubscriptionOptions {
    pub fn with_qos(qos: QoS) -> Self {
        Self {
            qos,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intra_process_setting_resolution() {
        assert!(IntraProcessSetting::NodeDefault.resolve(true));
        assert!(!IntraProcessSetting::NodeDefault.resolve(false));
        assert!(IntraProcessSetting::Enable.resolve(false));
        assert!(!IntraProcessSetting::Disable.resolve(true));
    }

    #[test]
    fn test_defaults() {
        let node = NodeOptions::default();
        assert_eq!(node.namespace, "/");
        assert!(!node.use_intra_process_comms);

        let sub = SubscriptionOptions::with_qos(QoS::keep_last(3));
        assert_eq!(sub.qos.depth, 3);
        assert!(sub.callback_group.is_none());
        assert!(sub.intra_process_buffer_type.is_none());
    }
}

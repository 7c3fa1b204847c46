//! Error types used by the executor, the entities collector and node registration.
//!
//! Everything surfaces through a single enum, [`ExecutorError`], grouped by
//! [`ErrorKind`]:
//!
//! - **Usage**: the caller broke a contract (double-add of a node, re-entrant spin,
//!   wait-set calls on a push-driven entity, foreign callback group).
//! - **InvalidArgument**: bad durations or QoS combinations refused before any state
//!   is mutated.
//! - **Runtime**: a transport-level signal operation failed; carries the transport's
//!   diagnostic text.
//!
//! Errors are never retried by the crate; they propagate to the immediate caller.

use thiserror::Error;

/// Coarse classification of an [`ExecutorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller violated an API contract.
    Usage,
    /// An argument (duration, QoS profile) was rejected.
    InvalidArgument,
    /// An underlying signal/transport operation failed.
    Runtime,
}

/// # Errors produced by the executor and registration paths.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Node is already owned by an executor.
    #[error("node '{node}' has already been added to an executor")]
    NodeAlreadyAdded {
        /// Fully qualified node name.
        node: String,
    },

    /// Node was never added to this executor (or was already removed).
    #[error("node '{node}' is not associated with this executor")]
    NodeNotFound {
        /// Fully qualified node name.
        node: String,
    },

    /// `spin*` was called while another spin of the same executor is running.
    #[error("executor is already spinning")]
    AlreadySpinning,

    /// Wait-set style call on an entity that is driven by pushed events.
    #[error("{entity} is event driven and does not support wait sets")]
    WaitSetUnsupported {
        /// Short entity description.
        entity: &'static str,
    },

    /// Explicit callback group does not belong to the node creating the entity.
    #[error("Cannot create {entity}, callback group not in node.")]
    CallbackGroupNotInNode {
        /// Entity kind being created ("publisher", "subscription", ...).
        entity: &'static str,
    },

    /// Rejected argument.
    #[error("{reason}")]
    InvalidArgument {
        /// Human-readable reason.
        reason: String,
    },

    /// Underlying signal or transport operation failed.
    #[error("{context}: {message}")]
    Transport {
        /// What the crate was doing.
        context: String,
        /// Diagnostic text of the failing layer.
        message: String,
    },
}

impl ExecutorError {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        ExecutorError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(context: impl Into<String>, message: impl Into<String>) -> Self {
        ExecutorError::Transport {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Wraps a lower level error with a new context, keeping its diagnostic text.
    pub(crate) fn with_context(self, context: impl Into<String>) -> Self {
        let message = match self {
            ExecutorError::Transport { message, .. } => message,
            other => other.to_string(),
        };
        ExecutorError::transport(context, message)
    }

    /// Returns the coarse [`ErrorKind`] of this error.
    ///
    /// # Example
    /// ```
    /// use events_executor::{ErrorKind, ExecutorError};
    ///
    /// assert_eq!(ExecutorError::AlreadySpinning.kind(), ErrorKind::Usage);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::NodeAlreadyAdded { .. }
            | ExecutorError::NodeNotFound { .. }
            | ExecutorError::AlreadySpinning
            | ExecutorError::WaitSetUnsupported { .. }
            | ExecutorError::CallbackGroupNotInNode { .. } => ErrorKind::Usage,
            ExecutorError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            ExecutorError::Transport { .. } => ErrorKind::Runtime,
        }
    }

    /// Snake-case name of the variant, used as a log field.
    ///
    /// # Example
    /// ```
    /// use events_executor::ExecutorError;
    ///
    /// let err = ExecutorError::NodeAlreadyAdded { node: "/talker".into() };
    /// assert_eq!(err.as_label(), "node_already_added");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorError::NodeAlreadyAdded { .. } => "node_already_added",
            ExecutorError::NodeNotFound { .. } => "node_not_found",
            ExecutorError::AlreadySpinning => "already_spinning",
            ExecutorError::WaitSetUnsupported { .. } => "wait_set_unsupported",
            ExecutorError::CallbackGroupNotInNode { .. } => "callback_group_not_in_node",
            ExecutorError::InvalidArgument { .. } => "invalid_argument",
            ExecutorError::Transport { .. } => "transport_error",
        }
    }

    /// True for contract violations by the caller.
    pub fn is_usage(&self) -> bool {
        self.kind() == ErrorKind::Usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert!(ExecutorError::AlreadySpinning.is_usage());
        assert!(
            ExecutorError::WaitSetUnsupported { entity: "notify waitable" }.is_usage()
        );
        assert_eq!(
            ExecutorError::invalid_argument("bad").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            ExecutorError::transport("ctx", "boom").kind(),
            ErrorKind::Runtime
        );
    }

    #[test]
    fn test_transport_message_carries_underlying_text() {
        let err = ExecutorError::transport(
            "Failed to notify wait set on publisher creation",
            "context is shut down",
        );
        assert_eq!(
            err.to_string(),
            "Failed to notify wait set on publisher creation: context is shut down"
        );
    }

    #[test]
    fn test_with_context_keeps_transport_text() {
        let err = ExecutorError::transport("trigger", "context is shut down")
            .with_context("Couldn't set node guard condition callback");
        assert_eq!(
            err.to_string(),
            "Couldn't set node guard condition callback: context is shut down"
        );
    }

    #[test]
    fn test_group_not_in_node_message() {
        let err = ExecutorError::CallbackGroupNotInNode { entity: "publisher" };
        assert_eq!(
            err.to_string(),
            "Cannot create publisher, callback group not in node."
        );
        assert_eq!(err.as_label(), "callback_group_not_in_node");
    }
}

//! # Intra-process delivery.
//!
//! Publishers and subscriptions of one context that opt into intra-process
//! communication exchange messages as shared pointers, without going through the
//! transport.
//!
//! - [`IntraProcessManager`] registry keyed by numeric id; one per context, created on
//!   first use and released with the last endpoint holding it.
//! - [`SubscriptionIntraProcess`] receiving companion of a subscription.
//! - [`IntraProcessBuffer`] bounded storage of the companion.
//! - [`ActionServerIntraProcessBase`] waitable adapter for action servers.

mod action_server;
mod buffer;
mod manager;
mod subscription;

pub use action_server::ActionServerIntraProcessBase;
pub use buffer::{IntraProcessBuffer, IntraProcessBufferType};
pub use manager::IntraProcessManager;
pub use subscription::{SubscriptionIntraProcess, SubscriptionIntraProcessBase};

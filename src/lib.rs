//! # events-executor
//!
//! **events-executor** is the event-dispatch core of an in-process pub/sub client.
//!
//! Nodes own publishers, subscriptions, services, clients, timers and generic
//! waitables. An [`EventsExecutor`] does not poll them: every entity pushes an event
//! into the executor's ready queue the moment it has work, and the executor runs
//! timers (tracked by its own timer manager) and queued events in order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │     Node     │   │     Node     │   │     Node     │
//!     │ subs, timers │   │ srv, clients │   │  waitables   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ push (entity, type, node)           │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventsExecutor                                                   │
//! │  - ReadyQueue (locked EventsQueue + wakeup)                       │
//! │  - TimersManager (next expiry, due timers)                        │
//! │  - EntitiesCollector (node ownership, entity map, rebuilds)       │
//! │  - NotifyWaitable (interrupt, context shutdown)                   │
//! └──────┬───────────────────────────────────────────────────┬────────┘
//!        │ spin / spin_some / spin_all / spin_once           │ publish(Event)
//!        ▼                                                   ▼
//!   timer callbacks, entity.execute()          Bus ──► subscriber listener ──► SubscriberSet
//! ```
//!
//! ### Intra-process path
//! ```text
//! Publisher ──► IntraProcessManager ──► SubscriptionIntraProcess buffer ──► push event
//!          └──► middleware (other subscriptions; intra-process pairs skipped)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Executor**      | Push-driven dispatch, four spin variants, cancellation.         | [`EventsExecutor`], [`EventsExecutorBuilder`] |
//! | **Nodes**         | Entity factories, callback groups, name resolution.             | [`Node`], [`CallbackGroup`]                 |
//! | **Entities**      | Timers, pub/sub, services/clients, QoS events, waitables.       | [`Timer`], [`Subscription`], [`Waitable`]   |
//! | **Intra-process** | Zero-copy delivery between endpoints of one context.            | [`IntraProcessManager`]                     |
//! | **Subscriber API**| Observe executor events (logging, metrics, custom subscribers). | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors grouped by kind.                                   | [`ExecutorError`], [`ErrorKind`]            |
//! | **Configuration** | Bus capacity and drain batch size.                              | [`ExecutorConfig`]                          |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use events_executor::{Context, EventsExecutor, Node, QoS};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), events_executor::ExecutorError> {
//!     let ctx = Context::new();
//!     let node = Node::new(&ctx, "talker");
//!
//!     let publisher = node.create_publisher::<String>("chatter", QoS::default())?;
//!     let _sub = node.create_subscription::<String, _>("chatter", QoS::default(), |msg| {
//!         println!("heard: {msg}");
//!     })?;
//!
//!     let executor = EventsExecutor::new(&ctx)?;
//!     executor.add_node(&node)?;
//!
//!     publisher.publish("hello".to_string())?;
//!     executor.spin_all(Duration::from_millis(100)).await?;
//!     Ok(())
//! }
//! ```
mod config;
mod context;
mod core;
mod entities;
mod error;
mod events;
mod intra_process;
mod middleware;
mod node;
mod qos;
mod signal;
mod subscribers;

// public surface

pub use config::ExecutorConfig;
pub use context::Context;
pub use core::{
    EntitiesCollector, EventsCallback, EventsExecutor, EventsExecutorBuilder, EventsQueue,
    ExecutorEvent, ExecutorEventType, ReadyQueue, SimpleEventsQueue, TimersManager,
};
pub use entities::{
    Client, ClientBase, EntityId, ExecutableEntity, IncompatibleQosCallback, IncompatibleQosStatus,
    MessageCallback, Publisher, PublisherBase, QosEventHandler, QosEventKind, ResponseCallback,
    Service, ServiceBase, Subscription, SubscriptionBase, Timer, Waitable,
};
pub use error::{ErrorKind, ExecutorError};
pub use events::{Bus, Event, EventCategory, EventKind};
pub use intra_process::{
    ActionServerIntraProcessBase, IntraProcessBuffer, IntraProcessBufferType, IntraProcessManager,
    SubscriptionIntraProcess, SubscriptionIntraProcessBase,
};
pub use node::{
    CallbackGroup, CallbackGroupType, IntraProcessSetting, Node, NodeId, NodeOptions,
    NodeServices, NodeTopics, PublisherEventCallbacks, PublisherFactory, PublisherOptions,
    SubscriptionEventCallbacks, SubscriptionFactory, SubscriptionOptions,
};
pub use qos::{Durability, History, QoS, QosPolicyKind, Reliability, incompatible_policy};
pub use signal::{GuardCondition, WaitSet};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};

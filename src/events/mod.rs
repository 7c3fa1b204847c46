//! Executor events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by executors, their entities
//! collector and subscriber workers.
//!
//! ## Contents
//! - [`Event`], [`EventKind`], [`EventCategory`]: what happened and its metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `EventsExecutor` (spin/cancel/stale events), `EntitiesCollector`
//!   (node and rebuild events), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the executor's subscriber listener (fans out to `SubscriberSet`)
//!   and any receiver obtained through [`EventsExecutor::subscribe`](crate::EventsExecutor::subscribe).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventCategory, EventKind};

//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the built-in [`LogWriter`], for handling executor events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! EventsExecutor ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet::emit
//!                                                                        │
//!                                                          ┌─────────────┼─────────────┐
//!                                                          ▼             ▼             ▼
//!                                                      LogWriter      Metrics        Custom
//! ```
//!
//! Subscribers are attached through
//! [`EventsExecutorBuilder::with_subscribers`](crate::EventsExecutorBuilder::with_subscribers).

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

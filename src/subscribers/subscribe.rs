//! # The `Subscribe` trait.
//!
//! Implement [`Subscribe`] to observe an executor's events (logging, metrics,
//! test probes). Each subscriber gets its own worker and bounded lane inside the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), so `on_event` may await
//! freely without slowing the spinning task.
//!
//! When the lane is full the event is dropped for this subscriber and a
//! `SubscriberOverflow` event is published instead.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use events_executor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct RebuildCounter(AtomicUsize);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for RebuildCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::EntitiesRebuilt {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "rebuild-counter"
//!     }
//!
//!     fn queue_capacity(&self) -> usize {
//!         64
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Observer of executor events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Label used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's lane.
    fn queue_capacity(&self) -> usize {
        1024
    }
}

//! # LogWriter: executor events rendered through `tracing`.
//!
//! A minimal subscriber that logs incoming [`Event`]s. Topology and spin events are
//! logged at `debug`, skipped stale work at `trace`, subscriber failures at `warn`.
//!
//! ## Example output
//! ```text
//! DEBUG node added node="/talker"
//! DEBUG entities rebuilt count=4
//! DEBUG spin started variant="spin"
//! DEBUG cancel requested
//! DEBUG spin stopped variant="spin" executed=12
//! WARN  subscriber panicked subscriber="audit" info="boom"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that writes every executor event through `tracing`.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::NodeAdded => {
                tracing::debug!(node = ?e.node, "node added");
            }
            EventKind::NodeRemoved => {
                tracing::debug!(node = ?e.node, "node removed");
            }
            EventKind::EntitiesRebuilt => {
                tracing::debug!(count = ?e.count, "entities rebuilt");
            }
            EventKind::SpinStarted => {
                tracing::debug!(variant = ?e.reason, "spin started");
            }
            EventKind::SpinStopped => {
                tracing::debug!(variant = ?e.reason, executed = ?e.count, "spin stopped");
            }
            EventKind::CancelRequested => {
                tracing::debug!("cancel requested");
            }
            EventKind::StaleEventSkipped => {
                tracing::trace!(entity = ?e.entity, node = ?e.node, "stale event skipped");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = ?e.subscriber, reason = ?e.reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(
                    subscriber = e.subscriber.unwrap_or("unknown"),
                    info = e.reason.as_deref().unwrap_or("unknown"),
                    "subscriber panicked"
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

//! # Fan-out of executor events to subscribers.
//!
//! [`SubscriberSet`] gives every subscriber its own bounded lane and worker task, so
//! a slow or failing subscriber never holds up the executor or its peers.
//!
//! ```text
//! emit(&Event) ── Arc ──┬─► lane "log"     ─► worker ─► LogWriter::on_event
//!                       ├─► lane "metrics" ─► worker ─► Metrics::on_event
//!                       └─► lane ...              └─► panic caught → SubscriberPanicked on the bus
//! ```
//!
//! ## Rules
//! - `emit` never waits: a full or closed lane drops the event for that lane only,
//!   counts it, and reports `SubscriberOverflow` (overflow reports are not re-reported).
//! - Each lane is FIFO; lanes are not ordered relative to each other.
//! - A panicking subscriber is reported and keeps receiving later events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};

use super::Subscribe;

struct Lane {
    label: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
}

/// Per-subscriber queues and workers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

/// Drains one lane into its subscriber until the lane is closed.
async fn drive(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(event) = rx.recv().await {
        let outcome = std::panic::AssertUnwindSafe(sub.on_event(&event))
            .catch_unwind()
            .await;
        if let Err(payload) = outcome {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_text(&*payload)));
        }
    }
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; must run inside a tokio runtime.
    ///
    /// Lane capacity comes from [`Subscribe::queue_capacity`], at least 1.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    label: sub.name(),
                    tx,
                    dropped: AtomicU64::new(0),
                };
                (lane, tokio::spawn(drive(sub, rx, bus.clone())))
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Hands `event` to every lane.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Hands an already shared event to every lane.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let report = event.kind != EventKind::SubscriberOverflow;
        for lane in &self.lanes {
            let reason = match lane.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            lane.dropped.fetch_add(1, Ordering::Relaxed);
            if report {
                self.bus.publish(Event::subscriber_overflow(lane.label, reason));
            }
        }
    }

    /// Events dropped so far for the subscriber named `label`.
    pub fn dropped(&self, label: &str) -> Option<u64> {
        self.lanes
            .iter()
            .find(|lane| lane.label == label)
            .map(|lane| lane.dropped.load(Ordering::Relaxed))
    }

    /// Closes the lanes and waits until every worker has drained its backlog.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;

    struct Recorder {
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Exploding;

    #[async_trait]
    impl Subscribe for Exploding {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    /// Blocks on the first event until released; lane of one.
    struct Stuck {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _event: &Event) {
            self.release.notified().await;
        }

        fn name(&self) -> &'static str {
            "stuck"
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_each_lane_sees_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = SubscriberSet::new(
            vec![Arc::new(Recorder { seen: seen.clone() })],
            Bus::new(16),
        );
        assert_eq!(set.len(), 1);

        set.emit(&Event::new(EventKind::NodeAdded));
        set.emit(&Event::new(EventKind::EntitiesRebuilt));
        set.shutdown().await;

        assert_eq!(
            *seen.lock(),
            vec![EventKind::NodeAdded, EventKind::EntitiesRebuilt]
        );
    }

    #[tokio::test]
    async fn test_panic_is_reported_on_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Exploding)], bus);

        set.emit(&Event::new(EventKind::SpinStarted));
        let ev = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(ev.is_subscriber_panic());
        assert_eq!(ev.subscriber, Some("exploding"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));
        set.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_lane_drops_and_reports() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let release = Arc::new(Notify::new());
        let set = SubscriberSet::new(
            vec![Arc::new(Stuck {
                release: release.clone(),
            })],
            bus,
        );

        set.emit(&Event::new(EventKind::SpinStarted));
        // let the worker take the first event and block on it
        tokio::time::sleep(Duration::from_millis(20)).await;
        set.emit(&Event::new(EventKind::SpinStopped));
        set.emit(&Event::new(EventKind::CancelRequested));

        assert_eq!(set.dropped("stuck"), Some(1));
        let ev = rx.recv().await.unwrap();
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.reason.as_deref(), Some("full"));

        release.notify_one();
        release.notify_one();
        set.shutdown().await;
    }
}

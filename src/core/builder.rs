use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ExecutorConfig,
    context::Context,
    error::ExecutorError,
    events::{Bus, Event},
    subscribers::{Subscribe, SubscriberSet},
};
use super::{
    executor::EventsExecutor,
    queue::{EventsQueue, SimpleEventsQueue},
};

/// Builder for constructing an [`EventsExecutor`] with optional features.
pub struct EventsExecutorBuilder {
    context: Arc<Context>,
    cfg: ExecutorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    queue: Option<Box<dyn EventsQueue>>,
}

impl EventsExecutorBuilder {
    /// Creates a new builder for an executor on `context`.
    pub fn new(context: &Arc<Context>) -> Self {
        Self {
            context: Arc::clone(context),
            cfg: ExecutorConfig::default(),
            subscribers: Vec::new(),
            queue: None,
        }
    }

    pub fn with_config(mut self, cfg: ExecutorConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Subscribers that receive every event the executor publishes.
    ///
    /// Subscribers receive executor events (topology changes, spins, skipped work)
    /// through dedicated workers with bounded queues. Building with subscribers
    /// requires a tokio runtime.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the default FIFO ready queue.
    pub fn with_events_queue<Q: EventsQueue>(mut self, queue: Q) -> Self {
        self.queue = Some(Box::new(queue));
        self
    }

    /// Builds the executor.
    ///
    /// Fails if the context is already shut down, or if subscribers were given
    /// outside of a tokio runtime.
    pub fn build(self) -> Result<Arc<EventsExecutor>, ExecutorError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener = CancellationToken::new();
        let queue = self
            .queue
            .unwrap_or_else(|| Box::new(SimpleEventsQueue::new()));

        if !self.subscribers.is_empty() {
            let handle = tokio::runtime::Handle::try_current().map_err(|_| {
                ExecutorError::invalid_argument("event subscribers require a tokio runtime")
            })?;
            let rx = bus.subscribe();
            let subs = SubscriberSet::new(self.subscribers, bus.clone());
            handle.spawn(subscriber_listener(rx, subs, listener.clone()));
        }

        EventsExecutor::from_parts(self.cfg, self.context, queue, bus, listener)
    }
}

/// Forwards bus events to the subscriber set until the executor is dropped.
async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    subs: SubscriberSet,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(ev) => subs.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    subs.shutdown().await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::core::ExecutorEvent;
    use crate::events::EventKind;

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

    /// Last-in first-out queue, to check the queue is pluggable.
    #[derive(Default)]
    struct StackQueue(std::collections::VecDeque<ExecutorEvent>);

    impl EventsQueue for StackQueue {
        fn init(&mut self) {
            self.0.clear();
        }
        fn push(&mut self, event: ExecutorEvent) {
            self.0.push_front(event);
        }
        fn front(&self) -> Option<&ExecutorEvent> {
            self.0.front()
        }
        fn pop(&mut self) -> Option<ExecutorEvent> {
            self.0.pop_front()
        }
        fn is_empty(&self) -> bool {
            self.0.is_empty()
        }
        fn len(&self) -> usize {
            self.0.len()
        }
        fn take_all(&mut self) -> std::collections::VecDeque<ExecutorEvent> {
            std::mem::take(&mut self.0)
        }
    }

    #[test]
    fn test_subscribers_outside_runtime_are_rejected() {
        let ctx = Context::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let err = EventsExecutorBuilder::new(&ctx)
            .with_subscribers(vec![Arc::new(Recorder { seen })])
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "event subscribers require a tokio runtime");
    }

    #[test]
    fn test_build_without_subscribers_needs_no_runtime() {
        let ctx = Context::new();
        let executor = EventsExecutorBuilder::new(&ctx)
            .with_config(ExecutorConfig {
                max_events_per_wake: 4,
                ..ExecutorConfig::default()
            })
            .with_events_queue(StackQueue::default())
            .build()
            .unwrap();
        assert_eq!(executor.config().max_events_per_wake, 4);
    }

    #[tokio::test]
    async fn test_subscribers_receive_executor_events() {
        let ctx = Context::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let executor = EventsExecutorBuilder::new(&ctx)
            .with_subscribers(vec![Arc::new(Recorder { seen: seen.clone() })])
            .build()
            .unwrap();

        executor.spin_some(Duration::ZERO).await.unwrap();
        for _ in 0..50 {
            if seen.lock().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            *seen.lock(),
            vec![EventKind::SpinStarted, EventKind::SpinStopped]
        );
    }
}

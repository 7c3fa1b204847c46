//! # EventsExecutor: push-driven dispatch of timers and entity events.
//!
//! The executor owns a [`ReadyQueue`] fed by entity callbacks, a [`TimersManager`]
//! and an [`EntitiesCollector`]. Spinning alternates between sleeping until the next
//! timer expiry (or the next pushed event) and running work:
//!
//! ```text
//! spin():
//!   loop while not canceled and context valid
//!     ├─► wait(next timer expiry | event | cancel)
//!     ├─► run due timers one by one (oldest first, until canceled)
//!     └─► drain queued events (bounded by `max_events_per_wake`)
//!            ├─ collector event  → rebuild entity map
//!            ├─ notify event     → consume interrupt/shutdown triggers
//!            └─ entity event     → liveness check → entity.execute()
//! ```
//!
//! ## Rules
//! - Only one spin variant runs at a time; a concurrent call fails with
//!   [`ExecutorError::AlreadySpinning`].
//! - Due timers run before queued events.
//! - Events of destroyed (or no longer wired) entities are skipped, never executed.
//! - [`cancel`](EventsExecutor::cancel) never aborts a running callback; the loop
//!   stops before the next one starts.
//! - Every spin gets a fresh cancellation token, so a `cancel` issued while idle
//!   does not stop the next spin.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorConfig;
use crate::context::Context;
use crate::entities::{EntityId, ExecutableEntity};
use crate::error::ExecutorError;
use crate::events::{Bus, Event, EventKind};
use crate::node::Node;
use crate::signal::GuardCondition;

use super::builder::EventsExecutorBuilder;
use super::collector::EntitiesCollector;
use super::notify::NotifyWaitable;
use super::queue::EventsQueue;
use super::ready::{EventsCallback, ExecutorEvent, ExecutorEventType, ReadyQueue, Wake};
use super::timers::TimersManager;

/// Event-driven executor.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use events_executor::{Context, EventsExecutor, Node};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), events_executor::ExecutorError> {
///     let ctx = Context::new();
///     let node = Node::new(&ctx, "ticker");
///     let _timer = node.create_wall_timer(Duration::from_millis(100), || println!("tick"), None)?;
///
///     let executor = EventsExecutor::new(&ctx)?;
///     executor.add_node(&node)?;
///     executor.spin_all(Duration::from_secs(1)).await
/// }
/// ```
pub struct EventsExecutor {
    cfg: ExecutorConfig,
    context: Arc<Context>,
    bus: Bus,
    ready: Arc<ReadyQueue>,
    timers: Arc<TimersManager>,
    collector: EntitiesCollector,
    notify_waitable: Arc<NotifyWaitable>,
    spinning: AtomicBool,
    cancel: Mutex<CancellationToken>,
    listener: CancellationToken,
}

/// Clears the spinning flag and reports the spin outcome when a spin variant exits.
struct SpinGuard<'a> {
    executor: &'a EventsExecutor,
    variant: &'static str,
    executed: usize,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.executor.spinning.store(false, Ordering::Release);
        self.executor.bus.publish(
            Event::new(EventKind::SpinStopped)
                .with_reason(self.variant)
                .with_count(self.executed),
        );
    }
}

impl EventsExecutor {
    /// Creates an executor with the default configuration and no subscribers.
    pub fn new(context: &Arc<Context>) -> Result<Arc<Self>, ExecutorError> {
        Self::builder(context).build()
    }

    pub fn builder(context: &Arc<Context>) -> EventsExecutorBuilder {
        EventsExecutorBuilder::new(context)
    }

    pub(crate) fn from_parts(
        cfg: ExecutorConfig,
        context: Arc<Context>,
        mut queue: Box<dyn EventsQueue>,
        bus: Bus,
        listener: CancellationToken,
    ) -> Result<Arc<Self>, ExecutorError> {
        queue.init();
        let ready = ReadyQueue::new(queue);
        let timers = Arc::new(TimersManager::new(&ready));
        let collector = EntitiesCollector::new(&ready, Arc::clone(&timers), bus.clone());

        let notify_waitable = NotifyWaitable::new(
            GuardCondition::new(&context),
            context.create_shutdown_guard_condition(),
        );
        notify_waitable
            .bind(EventsCallback::new(
                &ready,
                ExecutorEvent {
                    entity: notify_waitable.entity_id(),
                    kind: ExecutorEventType::Waitable,
                    node: None,
                },
            ))
            .map_err(|e| e.with_context("Failed to create events executor"))?;

        Ok(Arc::new(Self {
            cfg,
            context,
            bus,
            ready,
            timers,
            collector,
            notify_waitable,
            spinning: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            listener,
        }))
    }

    /// Adds `node`; its entities start pushing events to this executor.
    ///
    /// Fails if the node already belongs to an executor.
    pub fn add_node(&self, node: &Arc<Node>) -> Result<(), ExecutorError> {
        self.collector.add_node(node)
    }

    /// Removes `node`; fails if it was not added to this executor.
    pub fn remove_node(&self, node: &Arc<Node>) -> Result<(), ExecutorError> {
        self.collector.remove_node(node)
    }

    /// Enqueues an event as if `entity` had signaled work.
    pub fn push_event(&self, entity: EntityId, kind: ExecutorEventType) {
        self.ready.push(ExecutorEvent {
            entity,
            kind,
            node: None,
        });
    }

    /// Runs until [`cancel`](Self::cancel) is called or the context shuts down.
    pub async fn spin(&self) -> Result<(), ExecutorError> {
        let (mut guard, token) = self.begin("spin")?;

        while !token.is_cancelled() && self.context.is_valid() {
            if self.ready.wait(self.timers.next_expiry(), &token).await == Wake::Canceled {
                break;
            }
            for _ in 0..self.timers.get_number_ready_timers() {
                if token.is_cancelled() || !self.timers.execute_head_timer() {
                    break;
                }
                guard.executed += 1;
            }

            let batch = self.cfg.events_per_wake(self.ready.len());
            for _ in 0..batch {
                if token.is_cancelled() {
                    break;
                }
                let Some(event) = self.ready.pop() else {
                    break;
                };
                if self.execute_event(event) {
                    guard.executed += 1;
                }
            }
        }
        Ok(())
    }

    /// Runs the work that is ready right now, without waiting for more.
    ///
    /// Timers due and events queued at the start are executed, timers first;
    /// anything that becomes ready meanwhile is left for the next call.
    /// `max_duration` bounds the call (`Duration::ZERO` = no bound).
    pub async fn spin_some(&self, max_duration: Duration) -> Result<(), ExecutorError> {
        let (mut guard, token) = self.begin("spin_some")?;
        guard.executed = self.run_ready(max_duration, false, &token);
        Ok(())
    }

    /// Runs ready work, including work that becomes ready meanwhile, until nothing
    /// is left or `max_duration` elapses.
    ///
    /// A zero `max_duration` is rejected.
    pub async fn spin_all(&self, max_duration: Duration) -> Result<(), ExecutorError> {
        if max_duration.is_zero() {
            return Err(ExecutorError::invalid_argument(
                "max_duration must be greater than 0",
            ));
        }
        let (mut guard, token) = self.begin("spin_all")?;
        guard.executed = self.run_ready(max_duration, true, &token);
        Ok(())
    }

    /// Waits for ready work and runs exactly one callback, timers included.
    ///
    /// `timeout = None` waits without bound; `Some(Duration::ZERO)` only checks what
    /// is ready now. Internal events (entity map rebuilds, wakeups) are handled on the
    /// way and do not count as the callback.
    pub async fn spin_once(&self, timeout: Option<Duration>) -> Result<(), ExecutorError> {
        let (mut guard, token) = self.begin("spin_once")?;
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if token.is_cancelled() || !self.context.is_valid() {
                return Ok(());
            }
            if self.timers.execute_head_timer() {
                guard.executed = 1;
                return Ok(());
            }
            if let Some(event) = self.ready.pop() {
                if self.execute_event(event) {
                    guard.executed = 1;
                    return Ok(());
                }
                continue;
            }

            let wait_until = match (deadline, self.timers.next_expiry()) {
                (Some(d), Some(t)) => Some(d.min(t)),
                (d, t) => d.or(t),
            };
            match self.ready.wait(wait_until, &token).await {
                Wake::Canceled => return Ok(()),
                Wake::Ready | Wake::Notified => {}
                Wake::TimedOut => {
                    if deadline.is_some_and(|d| d <= Instant::now()) {
                        if self.timers.execute_head_timer() {
                            guard.executed = 1;
                        }
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Requests the running spin to return.
    ///
    /// The callback executing right now (if any) completes; no new one starts.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
        if let Err(e) = self.notify_waitable.interrupt() {
            tracing::debug!(error = %e, "interrupt not delivered");
        }
        self.bus.publish(Event::new(EventKind::CancelRequested));
    }

    /// True while a spin variant runs.
    pub fn is_spinning(&self) -> bool {
        self.spinning.load(Ordering::Acquire)
    }

    /// Subscribes to the executor's event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.cfg
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn collector(&self) -> &EntitiesCollector {
        &self.collector
    }

    pub fn timers(&self) -> &TimersManager {
        &self.timers
    }

    /// Number of events waiting in the ready queue.
    pub fn queued_events(&self) -> usize {
        self.ready.len()
    }

    fn begin(&self, variant: &'static str) -> Result<(SpinGuard<'_>, CancellationToken), ExecutorError> {
        let token = {
            let mut slot = self.cancel.lock();
            if self.spinning.swap(true, Ordering::AcqRel) {
                return Err(ExecutorError::AlreadySpinning);
            }
            *slot = CancellationToken::new();
            slot.clone()
        };
        tracing::trace!(variant, "spin started");
        self.bus
            .publish(Event::new(EventKind::SpinStarted).with_reason(variant));
        Ok((
            SpinGuard {
                executor: self,
                variant,
                executed: 0,
            },
            token,
        ))
    }

    /// Runs ready timers and events; `exhaustive` keeps going past the initial snapshot.
    fn run_ready(&self, max_duration: Duration, exhaustive: bool, token: &CancellationToken) -> usize {
        let deadline = (!max_duration.is_zero()).then(|| Instant::now() + max_duration);
        let timers_at_start = self.timers.get_number_ready_timers();
        let events_at_start = self.ready.len();
        let (mut timers_run, mut events_run, mut executed) = (0, 0, 0);

        while !token.is_cancelled()
            && self.context.is_valid()
            && deadline.is_none_or(|d| Instant::now() < d)
        {
            if (exhaustive || timers_run < timers_at_start) && self.timers.execute_head_timer() {
                timers_run += 1;
                executed += 1;
                continue;
            }
            if exhaustive || events_run < events_at_start {
                if let Some(event) = self.ready.pop() {
                    events_run += 1;
                    if self.execute_event(event) {
                        executed += 1;
                    }
                    continue;
                }
            }
            break;
        }
        executed
    }

    /// Dispatches one queued event; `true` if a user callback ran.
    fn execute_event(&self, event: ExecutorEvent) -> bool {
        if event.entity == self.notify_waitable.entity_id() {
            self.notify_waitable.execute();
            return false;
        }
        if event.entity == self.collector.id() {
            self.collector.execute();
            return false;
        }

        let reason = match self.collector.lookup(event.entity) {
            Some(wired) if wired.entity.execute() => return true,
            Some(_) => "entity destroyed",
            None => "entity not wired",
        };
        tracing::trace!(entity = %event.entity, reason, "stale event skipped");
        self.bus.publish(
            Event::new(EventKind::StaleEventSkipped)
                .with_entity(event.entity)
                .with_reason(reason),
        );
        false
    }
}

impl Drop for EventsExecutor {
    fn drop(&mut self) {
        self.notify_waitable.unbind();
        self.listener.cancel();
    }
}

impl std::fmt::Debug for EventsExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventsExecutor")
            .field("spinning", &self.is_spinning())
            .field("queued", &self.ready.len())
            .field("collector", &self.collector)
            .field("timers", &self.timers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::entities::IncompatibleQosStatus;
    use crate::node::{
        CallbackGroupType, NodeOptions, SubscriptionEventCallbacks, SubscriptionOptions,
    };
    use crate::qos::{QoS, QosPolicyKind};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_single_ownership_of_nodes() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "talker");
        let first = EventsExecutor::new(&ctx).unwrap();
        let second = EventsExecutor::new(&ctx).unwrap();

        first.add_node(&node).unwrap();
        let err = second.add_node(&node).unwrap_err();
        assert_eq!(err.as_label(), "node_already_added");
        assert!(second.remove_node(&node).unwrap_err().is_usage());

        first.remove_node(&node).unwrap();
        second.add_node(&node).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_once_timeout_shorter_than_period_fires_nothing() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "ticker");
        let (count, tick) = counter();
        let _timer = node
            .create_wall_timer(Duration::from_millis(100), tick, None)
            .unwrap();
        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();

        let started = Instant::now();
        executor
            .spin_once(Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(started.elapsed(), Duration::from_millis(50));

        executor
            .spin_once(Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_once_with_timeout_equal_to_period_fires_once() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "ticker");
        let (count, tick) = counter();
        let _timer = node
            .create_wall_timer(Duration::from_millis(100), tick, None)
            .unwrap();
        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();

        executor
            .spin_once(Some(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_once_zero_timeout_does_not_block() {
        let ctx = Context::new();
        let executor = EventsExecutor::new(&ctx).unwrap();
        let started = Instant::now();
        executor.spin_once(Some(Duration::ZERO)).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_fires_timer_repeatedly_until_canceled() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "ticker");
        let (count, tick) = counter();
        let _timer = node
            .create_wall_timer(Duration::from_millis(10), tick, None)
            .unwrap();
        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();

        let spinner = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.spin().await })
        };
        tokio::time::sleep(Duration::from_millis(55)).await;
        executor.cancel();
        spinner.await.unwrap().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert!(!executor.is_spinning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wakes_spin_waiting_on_far_timer() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "slow");
        let (count, tick) = counter();
        let _timer = node
            .create_wall_timer(Duration::from_secs(3600), tick, None)
            .unwrap();
        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();

        let spinner = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.spin().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let canceled_at = Instant::now();
        executor.cancel();
        spinner.await.unwrap().unwrap();

        assert_eq!(canceled_at.elapsed(), Duration::ZERO);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_does_not_abort_running_callback() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "worker");
        let publisher = node.create_publisher::<u32>("jobs", QoS::default()).unwrap();

        let (entered_tx, entered_rx) = std::sync::mpsc::channel::<()>();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);
        let finished = Arc::new(AtomicUsize::new(0));
        let f = finished.clone();
        let _sub = node
            .create_subscription::<u32, _>("jobs", QoS::default(), move |_msg| {
                let _ = entered_tx.send(());
                let _ = release_rx.lock().unwrap().recv();
                f.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        publisher.publish(1).unwrap();
        publisher.publish(2).unwrap();

        let spinner = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.spin().await })
        };
        tokio::task::spawn_blocking(move || entered_rx.recv().unwrap())
            .await
            .unwrap();
        executor.cancel();
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        spinner.await.unwrap().unwrap();

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_timer_callback_stops_due_peers() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "ticker");
        let executor = EventsExecutor::new(&ctx).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let timers: Vec<_> = (0..4)
            .map(|_| {
                let weak = Arc::downgrade(&executor);
                let r = runs.clone();
                node.create_wall_timer(
                    Duration::from_millis(10),
                    move || {
                        r.fetch_add(1, Ordering::SeqCst);
                        if let Some(executor) = weak.upgrade() {
                            executor.cancel();
                        }
                    },
                    None,
                )
                .unwrap()
            })
            .collect();
        executor.add_node(&node).unwrap();

        executor.spin().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        drop(timers);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_some_runs_due_timer_before_queued_message() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "mixed");
        let publisher = node.create_publisher::<u32>("data", QoS::default()).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        let _sub = node
            .create_subscription::<u32, _>("data", QoS::default(), move |_msg| {
                o.lock().push("message");
            })
            .unwrap();
        let o = order.clone();
        let _timer = node
            .create_wall_timer(Duration::from_millis(10), move || o.lock().push("timer"), None)
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        publisher.publish(1).unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;

        executor.spin_some(Duration::ZERO).await.unwrap();
        assert_eq!(*order.lock(), vec!["timer", "message"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spin_runs_due_timer_before_queued_message() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "mixed");
        let executor = EventsExecutor::new(&ctx).unwrap();
        let publisher = node.create_publisher::<u32>("data", QoS::default()).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        let weak = Arc::downgrade(&executor);
        let _sub = node
            .create_subscription::<u32, _>("data", QoS::default(), move |_msg| {
                o.lock().push("message");
                if let Some(executor) = weak.upgrade() {
                    executor.cancel();
                }
            })
            .unwrap();
        let o = order.clone();
        let _timer = node
            .create_wall_timer(Duration::from_millis(10), move || o.lock().push("timer"), None)
            .unwrap();

        executor.add_node(&node).unwrap();
        publisher.publish(1).unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;

        executor.spin().await.unwrap();
        assert_eq!(*order.lock(), vec!["timer", "message"]);
    }

    #[tokio::test]
    async fn test_spin_once_runs_one_of_several_ready_messages() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "listener");
        let publisher = node.create_publisher::<u32>("chatter", QoS::default()).unwrap();
        let (count, _) = counter();
        let c = count.clone();
        let _sub = node
            .create_subscription::<u32, _>("chatter", QoS::default(), move |_msg| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        for n in 0..3 {
            publisher.publish(n).unwrap();
        }

        executor.spin_once(Some(Duration::ZERO)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        executor.spin_once(Some(Duration::ZERO)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reenabled_group_is_wired_again() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "ticker");
        let group = node.create_callback_group(CallbackGroupType::MutuallyExclusive);
        group.set_can_be_taken_from(false);
        let (count, tick) = counter();
        let _timer = node
            .create_wall_timer(Duration::from_millis(10), tick, Some(&group))
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        executor.spin_all(Duration::from_millis(100)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        group.set_can_be_taken_from(true);
        tokio::time::advance(Duration::from_millis(50)).await;
        executor.spin_all(Duration::from_millis(100)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_spin_is_rejected() {
        let ctx = Context::new();
        let executor = EventsExecutor::new(&ctx).unwrap();
        let (_guard, _token) = executor.begin("spin").unwrap();
        assert_eq!(
            executor.spin_some(Duration::ZERO).await.unwrap_err(),
            ExecutorError::AlreadySpinning
        );
    }

    #[tokio::test]
    async fn test_spin_all_rejects_zero_duration() {
        let ctx = Context::new();
        let executor = EventsExecutor::new(&ctx).unwrap();
        let err = executor.spin_all(Duration::ZERO).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
        assert!(!executor.is_spinning());
    }

    #[tokio::test]
    async fn test_spin_some_drains_only_the_snapshot() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "echo");
        let publisher = node.create_publisher::<u32>("loop", QoS::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let republish = publisher.clone();
        let _sub = node
            .create_subscription::<u32, _>("loop", QoS::default(), move |msg| {
                s.lock().push(*msg);
                let _ = republish.publish(*msg + 1);
            })
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        publisher.publish(0).unwrap();

        executor.spin_some(Duration::ZERO).await.unwrap();
        assert_eq!(*seen.lock(), vec![0]);
        executor.spin_some(Duration::ZERO).await.unwrap();
        assert_eq!(*seen.lock(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_spin_all_drains_work_created_meanwhile() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "echo");
        let publisher = node.create_publisher::<u32>("loop", QoS::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let republish = publisher.clone();
        let _sub = node
            .create_subscription::<u32, _>("loop", QoS::default(), move |msg| {
                s.lock().push(*msg);
                if *msg < 3 {
                    let _ = republish.publish(*msg + 1);
                }
            })
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        publisher.publish(0).unwrap();

        executor.spin_all(Duration::from_secs(1)).await.unwrap();
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_destroyed_subscription_is_never_invoked() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "listener");
        let publisher = node.create_publisher::<u32>("chatter", QoS::default()).unwrap();
        let (count, _) = counter();
        let c = count.clone();
        let sub = node
            .create_subscription::<u32, _>("chatter", QoS::default(), move |_msg| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        let mut events = executor.subscribe();
        executor.add_node(&node).unwrap();
        publisher.publish(7).unwrap();
        assert!(executor.queued_events() >= 1);

        drop(sub);
        executor.spin_some(Duration::ZERO).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let mut skipped = false;
        while let Ok(ev) = events.try_recv() {
            skipped |= ev.kind == EventKind::StaleEventSkipped;
        }
        assert!(skipped);
    }

    #[tokio::test]
    async fn test_construction_fails_on_shut_down_context() {
        let ctx = Context::new();
        ctx.shutdown();
        let err = EventsExecutor::new(&ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to create events executor: context is shut down"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_shutdown_stops_spin() {
        let ctx = Context::new();
        let executor = EventsExecutor::new(&ctx).unwrap();
        let spinner = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.spin().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        ctx.shutdown();
        spinner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "math");
        let _service = node
            .create_service::<(i64, i64), i64, _>("add", |req| req.0 + req.1)
            .unwrap();
        let client = node.create_client::<(i64, i64), i64>("add").unwrap();
        let answer = Arc::new(Mutex::new(None));
        let a = answer.clone();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        client
            .async_send_request((2, 3), move |sum| *a.lock() = Some(*sum))
            .unwrap();

        executor.spin_all(Duration::from_secs(1)).await.unwrap();
        assert_eq!(*answer.lock(), Some(5));
    }

    #[tokio::test]
    async fn test_incompatible_qos_callback_runs_through_executor() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "qos");
        let reported = Arc::new(Mutex::new(None::<IncompatibleQosStatus>));
        let r = reported.clone();
        let options = SubscriptionOptions {
            event_callbacks: SubscriptionEventCallbacks {
                incompatible_qos: Some(Arc::new(move |status: &IncompatibleQosStatus| {
                    *r.lock() = Some(*status);
                })),
            },
            ..SubscriptionOptions::with_qos(QoS::default())
        };
        let _sub = node
            .create_subscription_with_options::<u32, _>("sensor", options, |_msg| {})
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        executor.spin_all(Duration::from_millis(10)).await.unwrap();
        assert!(reported.lock().is_none());

        let _publisher = node
            .create_publisher::<u32>("sensor", QoS::default().best_effort())
            .unwrap();
        executor.spin_all(Duration::from_millis(10)).await.unwrap();

        let status = reported.lock().unwrap();
        assert_eq!(status.total_count, 1);
        assert_eq!(status.last_policy_kind, QosPolicyKind::Reliability);
    }

    #[tokio::test]
    async fn test_intra_process_delivery_through_executor() {
        let ctx = Context::new();
        let node = Node::with_options(&ctx, "ipc", NodeOptions::default().use_intra_process_comms(true));
        let publisher = node.create_publisher::<String>("chatter", QoS::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let _sub = node
            .create_subscription::<String, _>("chatter", QoS::default(), move |msg| {
                s.lock().push(msg.as_str().to_owned());
            })
            .unwrap();

        let executor = EventsExecutor::new(&ctx).unwrap();
        executor.add_node(&node).unwrap();
        publisher.publish("hello".to_string()).unwrap();
        executor.spin_all(Duration::from_secs(1)).await.unwrap();

        assert_eq!(*seen.lock(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_spin_events_are_published() {
        let ctx = Context::new();
        let executor = EventsExecutor::new(&ctx).unwrap();
        let mut rx = executor.subscribe();
        executor.spin_some(Duration::ZERO).await.unwrap();

        assert_eq!(rx.try_recv().unwrap().kind, EventKind::SpinStarted);
        let stopped = rx.try_recv().unwrap();
        assert_eq!(stopped.kind, EventKind::SpinStopped);
        assert_eq!(stopped.reason.as_deref(), Some("spin_some"));
    }
}

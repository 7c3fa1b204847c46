//! # Notify waitable: executor-internal wakeups.
//!
//! Groups the guard conditions that only exist to wake the spinning task:
//! the executor's interrupt (triggered by `cancel`) and its shutdown guard condition
//! from the context. Both push the same event; executing it just consumes the triggers.

use std::sync::Arc;

use crate::core::EventsCallback;
use crate::entities::{EntityId, ExecutableEntity, Waitable};
use crate::error::ExecutorError;
use crate::signal::{GuardCondition, WaitSet};

pub(crate) struct NotifyWaitable {
    id: EntityId,
    interrupt: Arc<GuardCondition>,
    shutdown: Arc<GuardCondition>,
}

impl NotifyWaitable {
    pub(crate) fn new(interrupt: Arc<GuardCondition>, shutdown: Arc<GuardCondition>) -> Arc<Self> {
        Arc::new(Self {
            id: EntityId::next(),
            interrupt,
            shutdown,
        })
    }

    /// Installs `callback` on both guard conditions.
    pub(crate) fn bind(&self, callback: EventsCallback) -> Result<(), ExecutorError> {
        self.interrupt
            .set_on_trigger_callback(Some(callback.clone()))
            .and_then(|()| self.shutdown.set_on_trigger_callback(Some(callback)))
            .map_err(|e| e.with_context("Couldn't set guard condition callback"))
    }

    pub(crate) fn unbind(&self) {
        let _ = self.interrupt.set_on_trigger_callback(None);
        let _ = self.shutdown.set_on_trigger_callback(None);
    }

    /// Wakes the spinning task.
    pub(crate) fn interrupt(&self) -> Result<(), ExecutorError> {
        self.interrupt.trigger()
    }
}

impl ExecutableEntity for NotifyWaitable {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn set_events_executor_callback(&self, callback: Option<EventsCallback>) {
        match callback {
            Some(cb) => {
                if let Err(e) = self.bind(cb) {
                    tracing::warn!(error = %e, "notify waitable not bound");
                }
            }
            None => self.unbind(),
        }
    }

    fn execute(&self) {
        self.interrupt.take_triggered();
        self.shutdown.take_triggered();
    }
}

impl Waitable for NotifyWaitable {
    fn add_to_wait_set(&self, _wait_set: &mut WaitSet) -> Result<(), ExecutorError> {
        Err(ExecutorError::WaitSetUnsupported {
            entity: "notify waitable",
        })
    }

    fn is_ready(&self, _wait_set: &WaitSet) -> Result<bool, ExecutorError> {
        Err(ExecutorError::WaitSetUnsupported {
            entity: "notify waitable",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::core::{ExecutorEvent, ExecutorEventType, ReadyQueue, SimpleEventsQueue};

    fn notify_waitable(ctx: &Arc<Context>) -> Arc<NotifyWaitable> {
        NotifyWaitable::new(GuardCondition::new(ctx), ctx.create_shutdown_guard_condition())
    }

    #[test]
    fn test_interrupt_and_shutdown_push_events() {
        let ctx = Context::new();
        let queue = ReadyQueue::new(Box::new(SimpleEventsQueue::new()));
        let nw = notify_waitable(&ctx);
        let event = ExecutorEvent {
            entity: nw.entity_id(),
            kind: ExecutorEventType::Waitable,
            node: None,
        };
        nw.bind(EventsCallback::new(&queue, event)).unwrap();

        nw.interrupt().unwrap();
        ctx.shutdown();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(event));

        nw.execute();
        assert!(nw.interrupt().is_err());
    }

    #[test]
    fn test_bind_fails_on_shut_down_context() {
        let ctx = Context::new();
        let queue = ReadyQueue::new(Box::new(SimpleEventsQueue::new()));
        let nw = notify_waitable(&ctx);
        ctx.shutdown();

        let event = ExecutorEvent {
            entity: nw.entity_id(),
            kind: ExecutorEventType::Waitable,
            node: None,
        };
        let err = nw.bind(EventsCallback::new(&queue, event)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Couldn't set guard condition callback: context is shut down"
        );
    }

    #[test]
    fn test_wait_set_contract_refused() {
        let ctx = Context::new();
        let nw = notify_waitable(&ctx);
        let mut ws = WaitSet::new();
        assert_eq!(
            nw.add_to_wait_set(&mut ws).unwrap_err(),
            ExecutorError::WaitSetUnsupported {
                entity: "notify waitable"
            }
        );
    }
}

//! # Guard condition: payload-free cross-thread wakeup.
//!
//! A [`GuardCondition`] can be triggered from any thread. Triggering does two things:
//! - wakes tasks blocked in [`GuardCondition::wait`] (wait-set style consumers);
//! - pushes one event through the installed on-trigger callback (executor style
//!   consumers), or marks it unread until a callback is installed; any number of
//!   unread triggers is replayed as a single event.
//!
//! A guard condition belongs to a [`Context`]; once the context is shut down,
//! triggering and installing callbacks fail with a transport error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Notify;

use crate::context::Context;
use crate::core::EventsCallback;
use crate::entities::ListenerSlot;
use crate::error::ExecutorError;

/// Cross-thread wakeup primitive bound to a context.
pub struct GuardCondition {
    context: Weak<Context>,
    triggered: AtomicBool,
    notify: Notify,
    listener: ListenerSlot,
}

impl GuardCondition {
    /// Creates a guard condition owned by `context`.
    pub fn new(context: &Arc<Context>) -> Arc<Self> {
        Arc::new(Self {
            context: Arc::downgrade(context),
            triggered: AtomicBool::new(false),
            notify: Notify::new(),
            listener: ListenerSlot::coalescing(),
        })
    }

    fn check_context(&self, what: &str) -> Result<(), ExecutorError> {
        match self.context.upgrade() {
            Some(ctx) if ctx.is_valid() => Ok(()),
            _ => Err(ExecutorError::transport(what, "context is shut down")),
        }
    }

    /// Signals the guard condition.
    pub fn trigger(&self) -> Result<(), ExecutorError> {
        self.check_context("failed to trigger guard condition")?;
        self.fire();
        Ok(())
    }

    /// Signals without checking the context; used by the context's shutdown signal.
    pub(crate) fn fire(&self) {
        self.triggered.store(true, Ordering::Release);
        self.notify.notify_waiters();
        self.listener.notify();
    }

    /// Installs (`Some`) or removes (`None`) the on-trigger callback.
    ///
    /// Removing always succeeds; installing requires a valid context.
    pub fn set_on_trigger_callback(
        &self,
        callback: Option<EventsCallback>,
    ) -> Result<(), ExecutorError> {
        if callback.is_some() {
            self.check_context("failed to set guard condition callback")?;
        }
        self.listener.set(callback);
        Ok(())
    }

    /// Consumes a pending trigger, if any.
    pub fn take_triggered(&self) -> bool {
        self.triggered.swap(false, Ordering::AcqRel)
    }

    /// Waits until triggered or `timeout` elapses (`None` = no bound).
    ///
    /// Returns `true` when a trigger was consumed.
    pub async fn wait(&self, timeout: Option<Duration>) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.take_triggered() {
            return true;
        }

        match timeout {
            Some(t) => {
                if tokio::time::timeout(t, notified).await.is_err() {
                    return false;
                }
            }
            None => notified.await,
        }
        self.take_triggered()
    }
}

impl std::fmt::Debug for GuardCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardCondition")
            .field("triggered", &self.triggered.load(Ordering::Relaxed))
            .field("bound", &self.listener.is_set())
            .finish()
    }
}

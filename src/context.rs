//! # Context: process-level scope shared by nodes and executors.
//!
//! A [`Context`] owns:
//! - the in-process middleware all of its endpoints talk through;
//! - a validity flag flipped by [`Context::shutdown`];
//! - one shutdown guard condition per executor, all fired by [`Context::shutdown`];
//! - the intra-process manager, created on first use and dropped with the last
//!   endpoint that holds it.
//!
//! ## Example
//! ```rust
//! use events_executor::Context;
//!
//! let ctx = Context::new();
//! let ipm = ctx.intra_process_manager();
//! assert!(std::sync::Arc::ptr_eq(&ipm, &ctx.intra_process_manager()));
//!
//! ctx.shutdown();
//! assert!(!ctx.is_valid());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::ExecutorError;
use crate::intra_process::IntraProcessManager;
use crate::middleware::Middleware;
use crate::signal::GuardCondition;

/// Shared scope of nodes, endpoints and executors.
pub struct Context {
    valid: AtomicBool,
    middleware: Middleware,
    shutdown_guards: Mutex<Vec<Weak<GuardCondition>>>,
    intra_process: Mutex<Weak<IntraProcessManager>>,
}

impl Context {
    /// Creates a new, valid context.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            valid: AtomicBool::new(true),
            middleware: Middleware::new(),
            shutdown_guards: Mutex::new(Vec::new()),
            intra_process: Mutex::new(Weak::new()),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Invalidates the context and wakes every executor bound to it. Idempotent.
    pub fn shutdown(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            let guards = std::mem::take(&mut *self.shutdown_guards.lock());
            tracing::debug!(guards = guards.len(), "context shut down");
            for gc in guards.iter().filter_map(Weak::upgrade) {
                gc.fire();
            }
        }
    }

    /// Creates a guard condition fired once when the context shuts down.
    ///
    /// Each executor takes its own, so binding one never displaces another's callback.
    /// On an already shut down context the returned guard condition is triggered.
    pub fn create_shutdown_guard_condition(self: &Arc<Self>) -> Arc<GuardCondition> {
        let gc = GuardCondition::new(self);
        {
            let mut guards = self.shutdown_guards.lock();
            if self.is_valid() {
                guards.retain(|w| w.strong_count() > 0);
                guards.push(Arc::downgrade(&gc));
                return gc;
            }
        }
        gc.fire();
        gc
    }

    /// Returns the intra-process manager, creating it if no endpoint holds one.
    pub fn intra_process_manager(&self) -> Arc<IntraProcessManager> {
        let mut slot = self.intra_process.lock();
        if let Some(existing) = slot.upgrade() {
            return existing;
        }
        let manager = Arc::new(IntraProcessManager::new());
        *slot = Arc::downgrade(&manager);
        tracing::debug!("intra-process manager created");
        manager
    }

    /// True while some endpoint keeps the intra-process manager alive.
    pub fn has_intra_process_manager(&self) -> bool {
        self.intra_process.lock().strong_count() > 0
    }

    pub(crate) fn middleware(&self) -> &Middleware {
        &self.middleware
    }

    pub(crate) fn check_valid(&self, what: &str) -> Result<(), ExecutorError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ExecutorError::transport(what, "context is shut down"))
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intra_process_manager_released_with_last_holder() {
        let ctx = Context::new();
        assert!(!ctx.has_intra_process_manager());

        let first = ctx.intra_process_manager();
        let second = ctx.intra_process_manager();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(ctx.has_intra_process_manager());

        drop(first);
        drop(second);
        assert!(!ctx.has_intra_process_manager());

        let _recreated = ctx.intra_process_manager();
        assert!(ctx.has_intra_process_manager());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let ctx = Context::new();
        let gc = ctx.create_shutdown_guard_condition();
        ctx.shutdown();
        ctx.shutdown();
        assert!(!ctx.is_valid());
        assert!(gc.take_triggered());
        assert!(!gc.take_triggered());
        assert!(ctx.check_valid("publish").is_err());
        assert!(ctx.create_shutdown_guard_condition().take_triggered());
    }
}

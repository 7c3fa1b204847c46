//! Minimal wait set over guard conditions.
//!
//! Only waitables that are backed by a guard condition can take part; everything
//! push-driven refuses with [`ExecutorError::WaitSetUnsupported`](crate::ExecutorError).

use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, FutureExt};

use crate::error::ExecutorError;

use super::GuardCondition;

/// Collection of guard conditions waited on together.
#[derive(Default)]
pub struct WaitSet {
    guard_conditions: Vec<Arc<GuardCondition>>,
    ready: Vec<bool>,
}

impl WaitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a guard condition and returns its index.
    pub fn add_guard_condition(&mut self, guard_condition: Arc<GuardCondition>) -> usize {
        self.guard_conditions.push(guard_condition);
        self.ready.push(false);
        self.guard_conditions.len() - 1
    }

    pub fn len(&self) -> usize {
        self.guard_conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard_conditions.is_empty()
    }

    pub fn clear(&mut self) {
        self.guard_conditions.clear();
        self.ready.clear();
    }

    /// True if `guard_condition` is in the set and was triggered by the last wait.
    pub fn is_triggered(&self, guard_condition: &Arc<GuardCondition>) -> bool {
        self.guard_conditions
            .iter()
            .zip(&self.ready)
            .any(|(gc, ready)| *ready && Arc::ptr_eq(gc, guard_condition))
    }

    /// Waits until at least one guard condition triggers or `timeout` elapses.
    ///
    /// Returns the number of triggered guard conditions (`0` on timeout).
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<usize, ExecutorError> {
        if self.guard_conditions.is_empty() {
            return Err(ExecutorError::invalid_argument("wait set is empty"));
        }
        self.ready.iter_mut().for_each(|r| *r = false);

        let waits = self
            .guard_conditions
            .iter()
            .map(|gc| gc.wait(None).boxed());
        let any = future::select_all(waits);

        let first = match timeout {
            Some(t) => match tokio::time::timeout(t, any).await {
                Ok((_, index, _)) => Some(index),
                Err(_) => None,
            },
            None => Some(any.await.1),
        };

        if let Some(index) = first {
            self.ready[index] = true;
        }
        for (gc, ready) in self.guard_conditions.iter().zip(self.ready.iter_mut()) {
            if !*ready && gc.take_triggered() {
                *ready = true;
            }
        }
        Ok(self.ready.iter().filter(|r| **r).count())
    }
}

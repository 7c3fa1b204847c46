//! # Executor configuration.
//!
//! [`ExecutorConfig`] holds the tunables of one [`EventsExecutor`](crate::EventsExecutor).
//! Pass it through [`EventsExecutorBuilder::with_config`](crate::EventsExecutorBuilder::with_config);
//! [`EventsExecutor::new`](crate::EventsExecutor::new) uses [`ExecutorConfig::default`].
//!
//! Zero is a sentinel in both fields; read them through the accessors:
//! - `max_events_per_wake = 0`: `spin()` drains everything queued when it woke up
//! - `bus_capacity = 0`: treated as 1

/// Tunables of an events executor.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Ring size of the event bus. Receivers falling further behind observe `Lagged`.
    pub bus_capacity: usize,

    /// Events `spin()` runs per wake before it checks the timers again.
    ///
    /// `0` runs every event queued at wake time; `n` leaves the rest for the next pass,
    /// so due timers are not starved by a long queue.
    pub max_events_per_wake: usize,
}

impl ExecutorConfig {
    /// Bus ring size, at least 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// How many of `queued` events one `spin()` pass may run.
    #[inline]
    pub fn events_per_wake(&self, queued: usize) -> usize {
        match self.max_events_per_wake {
            0 => queued,
            n => n.min(queued),
        }
    }
}

impl Default for ExecutorConfig {
    /// 1024-event bus, unbounded drain per wake.
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            max_events_per_wake: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sentinels() {
        let cfg = ExecutorConfig {
            bus_capacity: 0,
            max_events_per_wake: 0,
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.events_per_wake(7), 7);
    }

    #[test]
    fn test_bounded_drain() {
        let cfg = ExecutorConfig {
            max_events_per_wake: 3,
            ..ExecutorConfig::default()
        };
        assert_eq!(cfg.events_per_wake(7), 3);
        assert_eq!(cfg.events_per_wake(2), 2);
    }
}

//! Notification primitives.
//!
//! - [`GuardCondition`]: trigger / wait-with-timeout / on-trigger callback.
//! - [`WaitSet`]: adapter that waits on several guard conditions at once.
//!
//! Executors never poll these; they bind the on-trigger callback and receive a
//! pushed event instead. The wait set exists for waitables that keep the classic
//! wait-set contract (see `ActionServerIntraProcessBase`).

mod guard;
mod wait_set;

pub use guard::GuardCondition;
pub use wait_set::WaitSet;

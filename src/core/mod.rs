//! Runtime core: event dispatch and executor lifecycle.
//!
//! The public entry point of this module is [`EventsExecutor`], built through
//! [`EventsExecutorBuilder`]. It runs timers and pushed entity events of the nodes
//! added to it.
//!
//! Internal modules:
//! - [`queue`]: storage of ready events ([`EventsQueue`], [`SimpleEventsQueue`]);
//! - [`ready`]: the locked queue plus wakeup signal, and the push-callback handed to entities;
//! - [`timers`]: timer bookkeeping and next-expiry computation;
//! - [`collector`]: node ownership and the entity map, rebuilt on topology changes;
//! - [`notify`]: executor-internal wakeups (interrupt, context shutdown);
//! - [`executor`]: the spin loops;
//! - [`builder`]: construction with optional subscribers and custom queue.

mod builder;
mod collector;
mod executor;
mod notify;
mod queue;
pub(crate) mod ready;
mod timers;

pub use builder::EventsExecutorBuilder;
pub use collector::EntitiesCollector;
pub use executor::EventsExecutor;
pub use queue::{EventsQueue, SimpleEventsQueue};
pub use ready::{EventsCallback, ExecutorEvent, ExecutorEventType, ReadyQueue};
pub use timers::TimersManager;

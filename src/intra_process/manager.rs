//! # Intra-process manager.
//!
//! Registry of intra-process publishers and subscription companions of one context.
//! A publication handed to [`IntraProcessManager::do_intra_process_publish`] is
//! delivered, as a shared pointer, to every live companion on the same topic whose
//! QoS is compatible with the publisher's.
//!
//! ## Rules
//! - Ids are unique per manager and never reused.
//! - Entries are weak; dropped endpoints are skipped and removed on their `Drop`.
//! - Targets are collected before delivery so no map shard is held while a
//!   companion runs its listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::entities::PublisherBase;
use crate::middleware::Payload;
use crate::qos::{QoS, incompatible_policy};

use super::SubscriptionIntraProcessBase;

struct PublisherInfo {
    publisher: Weak<dyn PublisherBase>,
    topic: String,
    qos: QoS,
}

struct SubscriptionInfo {
    subscription: Weak<dyn SubscriptionIntraProcessBase>,
    topic: String,
    qos: QoS,
}

/// Per-context intra-process registry.
pub struct IntraProcessManager {
    next_id: AtomicU64,
    publishers: DashMap<u64, PublisherInfo>,
    subscriptions: DashMap<u64, SubscriptionInfo>,
}

impl IntraProcessManager {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            publishers: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a publisher and returns its id.
    pub fn add_publisher<P>(&self, publisher: &Arc<P>) -> u64
    where
        P: PublisherBase + 'static,
    {
        let id = self.allocate_id();
        let weak = Arc::downgrade(publisher);
        let weak: Weak<dyn PublisherBase> = weak;
        self.publishers.insert(
            id,
            PublisherInfo {
                publisher: weak,
                topic: publisher.topic_name().to_string(),
                qos: publisher.qos(),
            },
        );
        tracing::trace!(id, topic = %publisher.topic_name(), "intra-process publisher added");
        id
    }

    /// Registers a subscription companion and returns its id.
    pub fn add_subscription<S>(&self, subscription: &Arc<S>) -> u64
    where
        S: SubscriptionIntraProcessBase + 'static,
    {
        let id = self.allocate_id();
        let weak = Arc::downgrade(subscription);
        let weak: Weak<dyn SubscriptionIntraProcessBase> = weak;
        self.subscriptions.insert(
            id,
            SubscriptionInfo {
                subscription: weak,
                topic: subscription.topic_name().to_string(),
                qos: subscription.qos(),
            },
        );
        tracing::trace!(id, topic = %subscription.topic_name(), "intra-process subscription added");
        id
    }

    /// Returns the live companion registered under `id`.
    pub fn get_subscription_by_id(&self, id: u64) -> Option<Arc<dyn SubscriptionIntraProcessBase>> {
        self.subscriptions
            .get(&id)
            .and_then(|info| info.subscription.upgrade())
    }

    /// Forgets the publisher or subscription registered under `id`.
    pub fn remove_by_id(&self, id: u64) {
        if self.publishers.remove(&id).is_none() {
            self.subscriptions.remove(&id);
        }
    }

    /// Live subscriptions the publisher `publisher_id` reaches.
    pub fn get_subscription_count(&self, publisher_id: u64) -> usize {
        self.targets(publisher_id).len()
    }

    /// Hands `payload` to every matching companion; returns how many accepted it.
    pub fn do_intra_process_publish(&self, publisher_id: u64, payload: Payload) -> usize {
        self.targets(publisher_id)
            .into_iter()
            .filter(|subscription| subscription.provide_intra_process_message(Arc::clone(&payload)))
            .count()
    }

    fn targets(&self, publisher_id: u64) -> Vec<Arc<dyn SubscriptionIntraProcessBase>> {
        let Some((topic, qos)) = self
            .publishers
            .get(&publisher_id)
            .filter(|info| info.publisher.strong_count() > 0)
            .map(|info| (info.topic.clone(), info.qos))
        else {
            tracing::debug!(publisher_id, "intra-process publisher unknown or dropped");
            return Vec::new();
        };
        self.subscriptions
            .iter()
            .filter(|entry| entry.topic == topic && incompatible_policy(&qos, &entry.qos).is_none())
            .filter_map(|entry| entry.subscription.upgrade())
            .collect()
    }
}

impl std::fmt::Debug for IntraProcessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntraProcessManager")
            .field("publishers", &self.publishers.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::context::Context;
    use crate::entities::{Publisher, shared_callback};
    use crate::intra_process::{IntraProcessBufferType, SubscriptionIntraProcess};
    use crate::node::PublisherOptions;

    fn counting_companion(
        topic: &str,
        qos: QoS,
        seen: &Arc<AtomicUsize>,
    ) -> Arc<SubscriptionIntraProcess<u32>> {
        let seen = Arc::clone(seen);
        SubscriptionIntraProcess::new(
            topic,
            qos,
            IntraProcessBufferType::DropOldest,
            shared_callback(move |_m: Arc<u32>| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_publish_reaches_matching_topic_only() {
        let ctx = Context::new();
        let ipm = IntraProcessManager::new();
        let publisher = Publisher::<u32>::new(&ctx, "/a", &PublisherOptions::default());
        let pub_id = ipm.add_publisher(&publisher);

        let seen = Arc::new(AtomicUsize::new(0));
        let on_a = counting_companion("/a", QoS::default(), &seen);
        let on_b = counting_companion("/b", QoS::default(), &seen);
        ipm.add_subscription(&on_a);
        ipm.add_subscription(&on_b);

        assert_eq!(ipm.get_subscription_count(pub_id), 1);
        assert_eq!(ipm.do_intra_process_publish(pub_id, Arc::new(7u32)), 1);
        assert_eq!(on_a.buffered(), 1);
        assert_eq!(on_b.buffered(), 0);
    }

    #[test]
    fn test_best_effort_publisher_skips_reliable_subscription() {
        let ctx = Context::new();
        let ipm = IntraProcessManager::new();
        let options = PublisherOptions {
            qos: QoS::default().best_effort(),
            ..PublisherOptions::default()
        };
        let publisher = Publisher::<u32>::new(&ctx, "/a", &options);
        let pub_id = ipm.add_publisher(&publisher);

        let seen = Arc::new(AtomicUsize::new(0));
        let reliable = counting_companion("/a", QoS::default(), &seen);
        let best_effort = counting_companion("/a", QoS::default().best_effort(), &seen);
        ipm.add_subscription(&reliable);
        ipm.add_subscription(&best_effort);

        assert_eq!(ipm.do_intra_process_publish(pub_id, Arc::new(1u32)), 1);
        assert_eq!(best_effort.buffered(), 1);
        assert_eq!(reliable.buffered(), 0);
    }

    #[test]
    fn test_removed_and_dropped_subscriptions_are_skipped() {
        let ctx = Context::new();
        let ipm = IntraProcessManager::new();
        let publisher = Publisher::<u32>::new(&ctx, "/a", &PublisherOptions::default());
        let pub_id = ipm.add_publisher(&publisher);

        let seen = Arc::new(AtomicUsize::new(0));
        let kept = counting_companion("/a", QoS::default(), &seen);
        let removed = counting_companion("/a", QoS::default(), &seen);
        let dropped = counting_companion("/a", QoS::default(), &seen);
        let kept_id = ipm.add_subscription(&kept);
        let removed_id = ipm.add_subscription(&removed);
        ipm.add_subscription(&dropped);
        assert_ne!(kept_id, removed_id);

        ipm.remove_by_id(removed_id);
        drop(dropped);

        assert!(ipm.get_subscription_by_id(removed_id).is_none());
        assert!(ipm.get_subscription_by_id(kept_id).is_some());
        assert_eq!(ipm.get_subscription_count(pub_id), 1);
    }

    #[test]
    fn test_unknown_publisher_reaches_nobody() {
        let ipm = IntraProcessManager::new();
        assert_eq!(ipm.do_intra_process_publish(42, Arc::new(1u32)), 0);
    }
}

//! # In-process middleware.
//!
//! Loopback transport owned by a [`Context`](crate::Context). It routes published
//! samples to subscriptions by topic and requests/responses between clients and
//! services by service name, and performs QoS matching when endpoints appear.
//!
//! ```text
//! Publisher ── publish ──► Middleware ──► RawSubscription inbox ──► ListenerSlot ──► executor
//! Client ──── request ───► Middleware ──► RawService inbox ──────► ListenerSlot ──► executor
//! Service ─── respond ───────────────────► RawClient inbox ───────► ListenerSlot ──► executor
//! ```
//!
//! ## Rules
//! - The middleware holds endpoints weakly; dropping the owning entity unregisters it.
//! - Incompatible publisher/subscription pairs exchange no samples and are reported
//!   once to both sides when the second endpoint appears.
//! - Samples from an intra-process publisher skip intra-process subscriptions; those
//!   receive through the intra-process manager instead.

mod endpoints;

pub(crate) use endpoints::{RawClient, RawPublisher, RawService, RawSubscription};

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::entities::QosEventHandler;
use crate::error::ExecutorError;
use crate::qos::{QoS, incompatible_policy};

/// Type-erased sample or request/response body.
pub type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct TopicEndpoints {
    publishers: Vec<Weak<RawPublisher>>,
    subscriptions: Vec<Weak<RawSubscription>>,
}

impl TopicEndpoints {
    fn prune(&mut self) {
        self.publishers.retain(|p| p.strong_count() > 0);
        self.subscriptions.retain(|s| s.strong_count() > 0);
    }

    fn live_publishers(&self) -> impl Iterator<Item = Arc<RawPublisher>> + '_ {
        self.publishers.iter().filter_map(Weak::upgrade)
    }

    fn live_subscriptions(&self) -> impl Iterator<Item = Arc<RawSubscription>> + '_ {
        self.subscriptions.iter().filter_map(Weak::upgrade)
    }
}

/// Per-context loopback transport.
pub(crate) struct Middleware {
    topics: Mutex<HashMap<String, TopicEndpoints>>,
    services: Mutex<HashMap<String, Weak<RawService>>>,
}

impl Middleware {
    pub(crate) fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            services: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn create_publisher(
        &self,
        topic: &str,
        qos: QoS,
        qos_events: Option<Weak<QosEventHandler>>,
    ) -> Arc<RawPublisher> {
        let publisher = Arc::new(RawPublisher::new(topic, qos, qos_events));
        let mismatched: Vec<_> = {
            let mut topics = self.topics.lock();
            let entry = topics.entry(topic.to_string()).or_default();
            entry.prune();
            entry.publishers.push(Arc::downgrade(&publisher));
            entry
                .live_subscriptions()
                .filter_map(|s| incompatible_policy(&qos, &s.qos).map(|p| (s, p)))
                .collect()
        };
        for (subscription, policy) in mismatched {
            publisher.report_incompatible(policy);
            subscription.report_incompatible(policy);
        }
        publisher
    }

    pub(crate) fn create_subscription(
        &self,
        topic: &str,
        qos: QoS,
        qos_events: Option<Weak<QosEventHandler>>,
    ) -> Arc<RawSubscription> {
        let subscription = Arc::new(RawSubscription::new(topic, qos, qos_events));
        let mismatched: Vec<_> = {
            let mut topics = self.topics.lock();
            let entry = topics.entry(topic.to_string()).or_default();
            entry.prune();
            entry.subscriptions.push(Arc::downgrade(&subscription));
            entry
                .live_publishers()
                .filter_map(|p| incompatible_policy(&p.qos, &qos).map(|k| (p, k)))
                .collect()
        };
        for (publisher, policy) in mismatched {
            publisher.report_incompatible(policy);
            subscription.report_incompatible(policy);
        }
        subscription
    }

    /// Delivers a sample to every compatible subscription; returns the number reached.
    pub(crate) fn publish(&self, publisher: &RawPublisher, payload: Payload) -> usize {
        let targets: Vec<Arc<RawSubscription>> = {
            let topics = self.topics.lock();
            match topics.get(&publisher.topic) {
                Some(entry) => entry
                    .live_subscriptions()
                    .filter(|s| incompatible_policy(&publisher.qos, &s.qos).is_none())
                    .filter(|s| !(publisher.is_intra_process() && s.is_intra_process()))
                    .collect(),
                None => Vec::new(),
            }
        };
        for subscription in &targets {
            subscription.deliver(Arc::clone(&payload));
        }
        targets.len()
    }

    pub(crate) fn subscription_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |e| e.live_subscriptions().count())
    }

    pub(crate) fn publisher_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map_or(0, |e| e.live_publishers().count())
    }

    pub(crate) fn create_service(&self, name: &str) -> Result<Arc<RawService>, ExecutorError> {
        let mut services = self.services.lock();
        if services.get(name).is_some_and(|s| s.strong_count() > 0) {
            return Err(ExecutorError::invalid_argument(format!(
                "service '{name}' already exists"
            )));
        }
        let service = Arc::new(RawService::new(name));
        services.insert(name.to_string(), Arc::downgrade(&service));
        Ok(service)
    }

    pub(crate) fn create_client(&self, service_name: &str) -> Arc<RawClient> {
        Arc::new(RawClient::new(service_name))
    }

    pub(crate) fn service_is_available(&self, name: &str) -> bool {
        self.services
            .lock()
            .get(name)
            .is_some_and(|s| s.strong_count() > 0)
    }

    /// Sends a request under `sequence`; without a live service the request is lost
    /// (volatile semantics) and `false` is returned.
    pub(crate) fn send_request(&self, client: &Arc<RawClient>, sequence: i64, payload: Payload) -> bool {
        let service = self
            .services
            .lock()
            .get(&client.service_name)
            .and_then(Weak::upgrade);
        match service {
            Some(service) => {
                client.request(&service, sequence, payload);
                true
            }
            None => {
                tracing::debug!(service = %client.service_name, "request sent with no service available");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(v: u32) -> Payload {
        Arc::new(v)
    }

    fn value(p: Payload) -> u32 {
        *p.downcast::<u32>().unwrap()
    }

    #[test]
    fn test_publish_routes_by_topic_and_respects_depth() {
        let mw = Middleware::new();
        let publisher = mw.create_publisher("/chatter", QoS::keep_last(2), None);
        let sub = mw.create_subscription("/chatter", QoS::keep_last(2), None);
        let other = mw.create_subscription("/other", QoS::keep_last(2), None);

        for v in 0..3 {
            assert_eq!(mw.publish(&publisher, payload(v)), 1);
        }
        assert_eq!(sub.take().map(value), Some(1));
        assert_eq!(sub.take().map(value), Some(2));
        assert!(sub.take().is_none());
        assert!(other.take().is_none());
    }

    #[test]
    fn test_incompatible_pairs_exchange_nothing() {
        let mw = Middleware::new();
        let publisher = mw.create_publisher("/t", QoS::keep_last(1), None);
        let _sub = mw.create_subscription("/t", QoS::keep_last(1).transient_local(), None);
        assert_eq!(mw.publish(&publisher, payload(1)), 0);
    }

    #[test]
    fn test_intra_process_pairs_are_skipped() {
        let mw = Middleware::new();
        let publisher = mw.create_publisher("/t", QoS::keep_last(1), None);
        let sub = mw.create_subscription("/t", QoS::keep_last(1), None);
        publisher.set_intra_process(true);
        sub.set_intra_process(true);
        assert_eq!(mw.publish(&publisher, payload(1)), 0);
        sub.set_intra_process(false);
        assert_eq!(mw.publish(&publisher, payload(1)), 1);
    }

    #[test]
    fn test_dropped_endpoints_disappear() {
        let mw = Middleware::new();
        let sub = mw.create_subscription("/t", QoS::default(), None);
        assert_eq!(mw.subscription_count("/t"), 1);
        drop(sub);
        assert_eq!(mw.subscription_count("/t"), 0);
        assert_eq!(mw.publisher_count("/t"), 0);
    }

    #[test]
    fn test_request_response_round() {
        let mw = Middleware::new();
        let service = mw.create_service("/add").unwrap();
        assert!(mw.create_service("/add").is_err());
        assert!(mw.service_is_available("/add"));

        let client = mw.create_client("/add");
        let seq = client.allocate_sequence();
        assert!(mw.send_request(&client, seq, payload(20)));
        let request = service.take().unwrap();
        assert_eq!(request.sequence, seq);
        let body = *request.payload.clone().downcast::<u32>().unwrap();
        assert!(request.respond(payload(body + 1)));

        let (resp_seq, resp) = client.take().unwrap();
        assert_eq!(resp_seq, seq);
        assert_eq!(value(resp), 21);
    }
}

//! Transport-level endpoints of the in-process middleware.
//!
//! Each endpoint with an inbox owns a [`ListenerSlot`]: one pushed executor event per
//! arrival. Inboxes follow the endpoint's QoS history (keep-last drops the oldest
//! sample, keep-all grows).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::EventsCallback;
use crate::entities::{ListenerSlot, QosEventHandler};
use crate::qos::{QoS, QosPolicyKind};

use super::Payload;

static GID_SEQ: AtomicU64 = AtomicU64::new(1);

fn report(handler: &Option<Weak<QosEventHandler>>, policy: QosPolicyKind) {
    if let Some(handler) = handler.as_ref().and_then(Weak::upgrade) {
        handler.on_incompatible(policy);
    }
}

/// Publisher endpoint.
pub(crate) struct RawPublisher {
    pub(crate) gid: u64,
    pub(crate) topic: String,
    pub(crate) qos: QoS,
    intra_process: AtomicBool,
    qos_events: Option<Weak<QosEventHandler>>,
}

impl RawPublisher {
    pub(crate) fn new(topic: &str, qos: QoS, qos_events: Option<Weak<QosEventHandler>>) -> Self {
        Self {
            gid: GID_SEQ.fetch_add(1, Ordering::Relaxed),
            topic: topic.to_string(),
            qos,
            intra_process: AtomicBool::new(false),
            qos_events,
        }
    }

    pub(crate) fn set_intra_process(&self, enabled: bool) {
        self.intra_process.store(enabled, Ordering::Release);
    }

    pub(crate) fn is_intra_process(&self) -> bool {
        self.intra_process.load(Ordering::Acquire)
    }

    pub(crate) fn report_incompatible(&self, policy: QosPolicyKind) {
        report(&self.qos_events, policy);
    }
}

/// Subscription endpoint with a QoS-bounded inbox.
pub(crate) struct RawSubscription {
    pub(crate) gid: u64,
    pub(crate) topic: String,
    pub(crate) qos: QoS,
    intra_process: AtomicBool,
    inbox: Mutex<VecDeque<Payload>>,
    listener: ListenerSlot,
    qos_events: Option<Weak<QosEventHandler>>,
}

impl RawSubscription {
    pub(crate) fn new(topic: &str, qos: QoS, qos_events: Option<Weak<QosEventHandler>>) -> Self {
        Self {
            gid: GID_SEQ.fetch_add(1, Ordering::Relaxed),
            topic: topic.to_string(),
            qos,
            intra_process: AtomicBool::new(false),
            inbox: Mutex::new(VecDeque::new()),
            listener: ListenerSlot::new(),
            qos_events,
        }
    }

    pub(crate) fn set_intra_process(&self, enabled: bool) {
        self.intra_process.store(enabled, Ordering::Release);
    }

    pub(crate) fn is_intra_process(&self) -> bool {
        self.intra_process.load(Ordering::Acquire)
    }

    pub(crate) fn deliver(&self, payload: Payload) {
        {
            let mut inbox = self.inbox.lock();
            if let Some(max) = self.qos.retention() {
                while inbox.len() >= max {
                    inbox.pop_front();
                }
            }
            inbox.push_back(payload);
        }
        self.listener.notify();
    }

    pub(crate) fn take(&self) -> Option<Payload> {
        self.inbox.lock().pop_front()
    }

    pub(crate) fn set_listener(&self, callback: Option<EventsCallback>) {
        self.listener.set(callback);
    }

    pub(crate) fn report_incompatible(&self, policy: QosPolicyKind) {
        report(&self.qos_events, policy);
    }
}

/// Request waiting in a service inbox.
pub(crate) struct ServiceRequest {
    pub(crate) sequence: i64,
    pub(crate) payload: Payload,
    reply_to: Weak<RawClient>,
}

impl ServiceRequest {
    /// Routes the response back to the requesting client, if it still exists.
    pub(crate) fn respond(self, payload: Payload) -> bool {
        match self.reply_to.upgrade() {
            Some(client) => {
                client.deliver(self.sequence, payload);
                true
            }
            None => false,
        }
    }
}

/// Service endpoint.
pub(crate) struct RawService {
    pub(crate) name: String,
    inbox: Mutex<VecDeque<ServiceRequest>>,
    listener: ListenerSlot,
}

impl RawService {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inbox: Mutex::new(VecDeque::new()),
            listener: ListenerSlot::new(),
        }
    }

    fn deliver(&self, request: ServiceRequest) {
        self.inbox.lock().push_back(request);
        self.listener.notify();
    }

    pub(crate) fn take(&self) -> Option<ServiceRequest> {
        self.inbox.lock().pop_front()
    }

    pub(crate) fn set_listener(&self, callback: Option<EventsCallback>) {
        self.listener.set(callback);
    }
}

/// Client endpoint.
pub(crate) struct RawClient {
    pub(crate) service_name: String,
    next_sequence: AtomicI64,
    inbox: Mutex<VecDeque<(i64, Payload)>>,
    listener: ListenerSlot,
}

impl RawClient {
    pub(crate) fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            next_sequence: AtomicI64::new(1),
            inbox: Mutex::new(VecDeque::new()),
            listener: ListenerSlot::new(),
        }
    }

    pub(crate) fn request(self: &Arc<Self>, service: &RawService, sequence: i64, payload: Payload) {
        service.deliver(ServiceRequest {
            sequence,
            payload,
            reply_to: Arc::downgrade(self),
        });
    }

    pub(crate) fn allocate_sequence(&self) -> i64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn deliver(&self, sequence: i64, payload: Payload) {
        self.inbox.lock().push_back((sequence, payload));
        self.listener.notify();
    }

    pub(crate) fn take(&self) -> Option<(i64, Payload)> {
        self.inbox.lock().pop_front()
    }

    pub(crate) fn set_listener(&self, callback: Option<EventsCallback>) {
        self.listener.set(callback);
    }
}

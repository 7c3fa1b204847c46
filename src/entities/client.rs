//! # Typed service client.
//!
//! Requests are sent immediately; responses arrive through the client's endpoint and
//! are dispatched by the executor that spins the client's node, in the order they
//! arrive, to the callback registered for their sequence number.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::context::Context;
use crate::core::EventsCallback;
use crate::error::ExecutorError;
use crate::middleware::RawClient;

use super::{EntityId, ExecutableEntity};

/// Type-erased view of a client.
pub trait ClientBase: ExecutableEntity {
    fn service_name(&self) -> &str;
    /// True when a service with this name currently exists.
    fn service_is_ready(&self) -> bool;
}

/// One-shot response callback.
pub type ResponseCallback<Res> = Box<dyn FnOnce(Arc<Res>) + Send>;

/// Client sending `Req` and receiving `Res`.
pub struct Client<Req, Res> {
    id: EntityId,
    context: Arc<Context>,
    raw: Arc<RawClient>,
    pending: Mutex<HashMap<i64, ResponseCallback<Res>>>,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> Client<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + Sync + 'static,
{
    pub(crate) fn new(context: &Arc<Context>, service_name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: EntityId::next(),
            context: Arc::clone(context),
            raw: context.middleware().create_client(service_name),
            pending: Mutex::new(HashMap::new()),
            _types: PhantomData,
        })
    }

    /// Sends `request`; `on_response` runs on the spinning executor when the response
    /// arrives. Returns the request sequence number.
    ///
    /// A request sent while no service exists is lost and its callback never runs.
    pub fn async_send_request<F>(&self, request: Req, on_response: F) -> Result<i64, ExecutorError>
    where
        F: FnOnce(Arc<Res>) + Send + 'static,
    {
        self.context.check_valid("failed to send request")?;
        let sequence = self.raw.allocate_sequence();
        self.pending.lock().insert(sequence, Box::new(on_response));
        if !self
            .context
            .middleware()
            .send_request(&self.raw, sequence, Arc::new(request))
        {
            self.pending.lock().remove(&sequence);
        }
        Ok(sequence)
    }

    /// Sends `request` and returns a receiver resolved when the response is dispatched.
    pub fn send_request(&self, request: Req) -> Result<oneshot::Receiver<Arc<Res>>, ExecutorError> {
        let (tx, rx) = oneshot::channel();
        self.async_send_request(request, move |response| {
            let _ = tx.send(response);
        })?;
        Ok(rx)
    }

    /// Requests sent and not answered yet.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<Req, Res> ExecutableEntity for Client<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + Sync + 'static,
{
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn set_events_executor_callback(&self, callback: Option<EventsCallback>) {
        self.raw.set_listener(callback);
    }

    fn execute(&self) {
        let Some((sequence, payload)) = self.raw.take() else {
            return;
        };
        let Some(on_response) = self.pending.lock().remove(&sequence) else {
            tracing::debug!(sequence, "response for unknown request");
            return;
        };
        match payload.downcast::<Res>() {
            Ok(response) => on_response(response),
            Err(_) => tracing::warn!(
                service = %self.raw.service_name,
                "dropping response of unexpected type"
            ),
        }
    }
}

impl<Req, Res> ClientBase for Client<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + Sync + 'static,
{
    fn service_name(&self) -> &str {
        &self.raw.service_name
    }

    fn service_is_ready(&self) -> bool {
        self.context
            .middleware()
            .service_is_available(&self.raw.service_name)
    }
}

impl<Req, Res> fmt::Debug for Client<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("service", &self.raw.service_name)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

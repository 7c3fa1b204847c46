//! Typed service: one request in, one response out.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::Context;
use crate::core::EventsCallback;
use crate::error::ExecutorError;
use crate::middleware::RawService;

use super::{EntityId, ExecutableEntity};

/// Type-erased view of a service.
pub trait ServiceBase: ExecutableEntity {
    fn service_name(&self) -> &str;
}

type RequestHandler<Req, Res> = Box<dyn FnMut(Arc<Req>) -> Res + Send>;

/// Service answering `Req` with `Res`.
pub struct Service<Req, Res> {
    id: EntityId,
    raw: Arc<RawService>,
    handler: Mutex<RequestHandler<Req, Res>>,
    _types: PhantomData<fn(Req) -> Res>,
}

impl<Req, Res> Service<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + Sync + 'static,
{
    pub(crate) fn new<F>(context: &Arc<Context>, name: &str, handler: F) -> Result<Arc<Self>, ExecutorError>
    where
        F: FnMut(Arc<Req>) -> Res + Send + 'static,
    {
        let raw = context.middleware().create_service(name)?;
        Ok(Arc::new(Self {
            id: EntityId::next(),
            raw,
            handler: Mutex::new(Box::new(handler)),
            _types: PhantomData,
        }))
    }
}

impl<Req, Res> ExecutableEntity for Service<Req, Res>
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
        let Some(request) = self.raw.take() else {
            return;
        };
        let body = match Arc::clone(&request.payload).downcast::<Req>() {
            Ok(body) => body,
            Err(_) => {
                tracing::warn!(service = %self.raw.name, "dropping request of unexpected type");
                return;
            }
        };
        let response = (self.handler.lock())(body);
        if !request.respond(Arc::new(response)) {
            tracing::debug!(service = %self.raw.name, "client gone before response");
        }
    }
}

impl<Req, Res> ServiceBase for Service<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + Sync + 'static,
{
    fn service_name(&self) -> &str {
        &self.raw.name
    }
}

impl<Req, Res> fmt::Debug for Service<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("id", &self.id)
            .field("name", &self.raw.name)
            .finish()
    }
}

use crate::request::Request;
use crate::response::ResponseSink;
use std::sync::Arc;

/// Terminal request handler.
///
/// Handlers are synchronous: when `serve` returns, the whole response,
/// body included, has been handed to the sink.
pub trait Handler: Send + Sync {
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseSink, &Request) + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request) {
        self(w, req)
    }
}

/// A step in front of a handler.
///
/// Implementations must call `next` exactly once unless they answer the
/// request themselves.
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler);
}

/// Ordered middleware chain in front of one endpoint.
///
/// Built once at startup and shared read-only by every worker.
#[derive(Clone)]
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Handler>,
}

impl Pipeline {
    pub fn new(endpoint: Arc<dyn Handler>) -> Self {
        Self {
            middleware: Vec::new(),
            endpoint,
        }
    }

    /// Append a middleware; the first one added runs outermost.
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        tracing::debug!(middleware = %middleware.name(), "Middleware added to pipeline");
        self.middleware.push(middleware);
        self
    }

    /// Names of the middleware, outermost first.
    pub fn names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl Handler for Pipeline {
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request) {
        Next {
            rest: &self.middleware,
            endpoint: self.endpoint.as_ref(),
        }
        .serve(w, req)
    }
}

/// Remainder of the chain as seen from one middleware.
struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Handler,
}

impl Handler for Next<'_> {
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request) {
        match self.rest.split_first() {
            Some((first, rest)) => first.handle(
                w,
                req,
                &Next {
                    rest,
                    endpoint: self.endpoint,
                },
            ),
            None => self.endpoint.serve(w, req),
        }
    }
}

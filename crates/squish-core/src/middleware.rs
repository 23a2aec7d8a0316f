//! Middleware trait and the chain that drives it

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Body type alias
pub type Body = Full<Bytes>;

/// Middleware trait for request/response processing
#[async_trait]
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Process a request, usually by calling `next.run(req)` and
    /// post-processing the response it returns.
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>>;
}

/// Boxed future returned by a terminal handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<Body>>> + Send>>;

/// Terminal handler invoked once every middleware has run
pub type HandlerFn = Box<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>;

/// Represents the rest of the chain after the current middleware
pub struct Next {
    stack: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    handler: Option<Arc<HandlerFn>>,
}

impl Next {
    /// Create a chain without a terminal handler; the last middleware
    /// is expected to produce the response itself.
    pub fn new(stack: Arc<[Arc<dyn Middleware>]>) -> Self {
        Self {
            stack,
            index: 0,
            handler: None,
        }
    }

    /// Create a chain that ends in `handler`
    pub fn with_handler(stack: Arc<[Arc<dyn Middleware>]>, handler: HandlerFn) -> Self {
        Self {
            stack,
            index: 0,
            handler: Some(Arc::new(handler)),
        }
    }

    /// Run the next middleware, or the handler once the stack is exhausted
    pub async fn run(self, req: Request<Body>) -> Result<Response<Body>> {
        match self.stack.get(self.index) {
            Some(middleware) => {
                let next = Self {
                    stack: Arc::clone(&self.stack),
                    index: self.index + 1,
                    handler: self.handler.clone(),
                };
                middleware.call(req, next).await
            }
            None => match self.handler {
                Some(handler) => handler(req).await,
                None => Err(Error::Internal(
                    "Middleware chain completed without handler".to_string(),
                )),
            },
        }
    }
}

impl Clone for Next {
    fn clone(&self) -> Self {
        Self {
            stack: Arc::clone(&self.stack),
            index: self.index,
            handler: self.handler.clone(),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &(self.stack.len() - self.index))
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

//! HTTP middleware around [`CompressionHandler`]

use crate::config::CompressionOptions;
use crate::handler::{CompressionHandler, CompressionOutcome};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING, VARY};
use http::response::Parts;
use http::{HeaderMap, HeaderValue, Request, Response};
use http_body_util::BodyExt;
use squish_core::{
    Body, Middleware, Next, RequestContext, ResponseBody, ResponseContext, Result,
};
use std::sync::Arc;
use tracing::debug;

/// Compression middleware
#[derive(Debug, Clone)]
pub struct CompressionMiddleware {
    handler: Arc<CompressionHandler>,
}

impl CompressionMiddleware {
    /// Create a middleware with its own handler and cache
    pub fn new(options: CompressionOptions) -> Result<Self> {
        Ok(Self::from_handler(Arc::new(CompressionHandler::new(options)?)))
    }

    /// Wrap an existing handler
    pub fn from_handler(handler: Arc<CompressionHandler>) -> Self {
        Self { handler }
    }

    /// The wrapped handler
    pub fn handler(&self) -> &Arc<CompressionHandler> {
        &self.handler
    }
}

#[async_trait]
impl Middleware for CompressionMiddleware {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        let request = RequestContext::from_request(&req);
        let response = next.run(req).await?;

        // Already encoded or not a success: nothing to do
        if response.headers().contains_key(CONTENT_ENCODING) || !response.status().is_success() {
            return Ok(response);
        }

        let (mut parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let Some(body) = response_body(&parts, &bytes) else {
            debug!("Response body is not UTF-8, passing through");
            return Ok(Response::from_parts(parts, Body::new(bytes)));
        };

        let mut context = ResponseContext::new(body);
        if let Some(content_type) = parts.headers.get(CONTENT_TYPE) {
            context = context.with_header(CONTENT_TYPE, content_type.clone());
        }
        match self.handler.handle_compression(&request, &mut context).await {
            CompressionOutcome::Compressed { body, .. } => {
                apply_headers(&mut parts, &context, body.len());
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            CompressionOutcome::Skipped(_) | CompressionOutcome::Fallback(_) => {
                Ok(Response::from_parts(parts, Body::new(bytes)))
            }
        }
    }
}

/// Map an upstream body onto the handler's view of it
fn response_body(parts: &Parts, bytes: &Bytes) -> Option<ResponseBody> {
    if bytes.is_empty() {
        return Some(ResponseBody::Empty);
    }

    let text = std::str::from_utf8(bytes).ok()?.to_string();
    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    Some(if is_json {
        ResponseBody::JsonText(text)
    } else {
        ResponseBody::Text(text)
    })
}

fn apply_headers(parts: &mut Parts, context: &ResponseContext, len: usize) {
    for (name, value) in context.headers() {
        parts.headers.insert(name.clone(), value.clone());
    }

    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    parts.headers.remove(TRANSFER_ENCODING);
    if !varies_on_accept_encoding(&parts.headers) {
        parts
            .headers
            .append(VARY, HeaderValue::from_static("accept-encoding"));
    }
}

fn varies_on_accept_encoding(headers: &HeaderMap) -> bool {
    headers
        .get_all(VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|token| token == "*" || token.eq_ignore_ascii_case("accept-encoding"))
}

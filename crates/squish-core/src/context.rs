//! Request and response contexts handed to the compression pipeline

use crate::Result;
use bytes::Bytes;
use http::header::{HeaderName, ACCEPT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Request};
use serde::Serialize;
use std::borrow::Cow;

/// Content type written for structured (JSON) responses
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Content type written for primitive (text) responses
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Read-only view of the request headers used for negotiation
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: HeaderMap,
}

impl RequestContext {
    /// Create a context from a header map
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Capture the headers of an HTTP request
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::new(req.headers().clone())
    }

    /// Append a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// All request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the request carries a header with this name
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Every `Accept-Encoding` value the client sent, in order
    pub fn accept_encoding(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(ACCEPT_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }
}

/// The value produced by the route handler
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Structured value, serialized as JSON
    Json(serde_json::Value),
    /// Already serialized JSON text
    JsonText(String),
    /// Primitive value, sent as plain text
    Text(String),
    /// No body
    Empty,
}

impl ResponseBody {
    /// Build a structured body from any serializable value
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Build a plain text body
    pub fn text(text: impl Into<String>) -> Self {
        ResponseBody::Text(text.into())
    }

    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }

    /// Serialize the body into its wire text and content type.
    ///
    /// Returns `Ok(None)` for [`ResponseBody::Empty`].
    pub fn serialize(&self) -> Result<Option<Serialized<'_>>> {
        let serialized = match self {
            ResponseBody::Json(value) => Serialized {
                text: Cow::Owned(serde_json::to_string(value)?),
                content_type: JSON_CONTENT_TYPE,
            },
            ResponseBody::JsonText(text) => Serialized {
                text: Cow::Borrowed(text),
                content_type: JSON_CONTENT_TYPE,
            },
            ResponseBody::Text(text) => Serialized {
                text: Cow::Borrowed(text),
                content_type: TEXT_CONTENT_TYPE,
            },
            ResponseBody::Empty => return Ok(None),
        };
        Ok(Some(serialized))
    }
}

impl From<serde_json::Value> for ResponseBody {
    /// Objects and arrays stay structured; strings, numbers and booleans
    /// become text; `null` is an empty body.
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ResponseBody::Empty,
            Value::String(s) => ResponseBody::Text(s),
            Value::Bool(b) => ResponseBody::Text(b.to_string()),
            Value::Number(n) => ResponseBody::Text(n.to_string()),
            value @ (Value::Array(_) | Value::Object(_)) => ResponseBody::Json(value),
        }
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::Text(text)
    }
}

impl From<&str> for ResponseBody {
    fn from(text: &str) -> Self {
        ResponseBody::Text(text.to_string())
    }
}

/// Wire form of a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Serialized<'a> {
    text: Cow<'a, str>,
    content_type: &'static str,
}

impl<'a> Serialized<'a> {
    /// Serialized text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Serialized bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Byte length of the serialized payload
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the payload is zero bytes long
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Content type matching the serialization
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Copy the payload into an owned buffer
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

}

/// The response under construction: its body and a mutable header sink
#[derive(Debug, Clone)]
pub struct ResponseContext {
    body: ResponseBody,
    headers: HeaderMap,
}

impl ResponseContext {
    /// Create a response context with no headers set
    pub fn new(body: impl Into<ResponseBody>) -> Self {
        Self {
            body: body.into(),
            headers: HeaderMap::new(),
        }
    }

    /// The response value
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Headers written so far
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Add a header before the pipeline runs, replacing any previous value
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// `Content-Type` declared on the response, if any
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Set a header, replacing any previous value
    pub fn set_header(&mut self, name: HeaderName, value: &'static str) {
        self.headers.insert(name, HeaderValue::from_static(value));
    }
}

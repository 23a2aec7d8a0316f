//! # Squish Core
//!
//! Core types, traits, and error handling shared by the Squish crates.
//!
//! This crate provides:
//! - Request/response contexts seen by the compression pipeline
//! - Middleware trait
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod error;
pub mod middleware;

pub use context::{RequestContext, ResponseBody, ResponseContext, Serialized};
pub use error::{Error, Result};
pub use middleware::{Body, HandlerFn, HandlerFuture, Middleware, Next};

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};

//! Decision whether a response should be compressed

use crate::compressor::{CompressionAlgorithm, Compressor};
use crate::config::CompressionOptions;
use regex::Regex;
use squish_core::{Error, RequestContext, ResponseBody, ResponseContext, Result, Serialized};
use std::fmt;

/// Request header that opts a request out of compression
pub const NO_COMPRESSION_HEADER: &str = "x-no-compression";

/// Why a response was left uncompressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The request carried `x-no-compression`
    DisabledByHeader,
    /// The selected encoding is not on the configured allow-list
    EncodingNotAllowed,
    /// The client did not accept the selected encoding
    NotAccepted,
    /// There is no body
    EmptyBody,
    /// The body could not be serialized
    Unserializable,
    /// The content type did not match the compressible pattern
    ContentTypeNotCompressible,
    /// The payload is smaller than the threshold
    BelowThreshold,
}

impl SkipReason {
    /// Short machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisabledByHeader => "disabled_by_header",
            Self::EncodingNotAllowed => "encoding_not_allowed",
            Self::NotAccepted => "not_accepted",
            Self::EmptyBody => "empty_body",
            Self::Unserializable => "unserializable",
            Self::ContentTypeNotCompressible => "content_type_not_compressible",
            Self::BelowThreshold => "below_threshold",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Compress this serialized payload
    Compress(Serialized<'a>),
    /// Leave the response alone
    Skip(SkipReason),
}

/// Compression gate, built once per handler
#[derive(Debug, Clone)]
pub struct CompressionPolicy {
    encoding: &'static str,
    disable_by_header: bool,
    encodings: Option<Vec<String>>,
    compressible_types: Option<Regex>,
    threshold: usize,
}

impl CompressionPolicy {
    /// Build the policy for `compressor`, compiling the content type pattern
    pub fn new(options: &CompressionOptions, compressor: Compressor) -> Result<Self> {
        let compressible_types = options
            .compressible_types
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            encoding: compressor.encoding(),
            disable_by_header: options.disable_by_header,
            encodings: options.encodings.clone(),
            compressible_types,
            threshold: options.threshold,
        })
    }

    /// Evaluate every rule in order, stopping at the first that says no.
    ///
    /// The content type pattern is matched against the type inferred from
    /// the body.
    pub fn evaluate<'a>(&self, request: &RequestContext, body: &'a ResponseBody) -> Decision<'a> {
        self.decide(request, body, None)
    }

    /// Like [`CompressionPolicy::evaluate`], but a `Content-Type` already
    /// declared on the response is what the pattern is matched against
    pub fn evaluate_response<'a>(
        &self,
        request: &RequestContext,
        response: &'a ResponseContext,
    ) -> Decision<'a> {
        self.decide(request, response.body(), response.content_type())
    }

    fn decide<'a>(
        &self,
        request: &RequestContext,
        body: &'a ResponseBody,
        declared_type: Option<&str>,
    ) -> Decision<'a> {
        if self.disable_by_header && request.has_header(NO_COMPRESSION_HEADER) {
            return Decision::Skip(SkipReason::DisabledByHeader);
        }

        if !self.encoding_allowed() {
            return Decision::Skip(SkipReason::EncodingNotAllowed);
        }

        if !accepts_encoding(request.accept_encoding(), self.encoding) {
            return Decision::Skip(SkipReason::NotAccepted);
        }

        let payload = match body.serialize() {
            Ok(Some(payload)) => payload,
            Ok(None) => return Decision::Skip(SkipReason::EmptyBody),
            Err(_) => return Decision::Skip(SkipReason::Unserializable),
        };

        if let Some(pattern) = &self.compressible_types {
            let content_type = declared_type.unwrap_or(payload.content_type());
            if !pattern.is_match(content_type) {
                return Decision::Skip(SkipReason::ContentTypeNotCompressible);
            }
        }

        if payload.len() < self.threshold {
            return Decision::Skip(SkipReason::BelowThreshold);
        }

        Decision::Compress(payload)
    }

    /// Whether the response should be compressed
    pub fn should_compress(&self, request: &RequestContext, body: &ResponseBody) -> bool {
        matches!(self.evaluate(request, body), Decision::Compress(_))
    }

    /// Encoding token this policy negotiates for
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    fn encoding_allowed(&self) -> bool {
        self.encodings
            .as_deref()
            .map_or(true, |allowed| encoding_listed(allowed, self.encoding))
    }
}

/// Whether an `encodings` allow-list names `encoding`, directly or through
/// an algorithm alias (`brotli` for `br`)
pub fn encoding_listed(allowed: &[String], encoding: &str) -> bool {
    allowed.iter().any(|token| {
        token.trim().eq_ignore_ascii_case(encoding)
            || CompressionAlgorithm::from_token(token).map(|a| a.encoding()) == Some(encoding)
    })
}

/// Check whether the `Accept-Encoding` values admit `encoding`.
///
/// Tokens are compared case-insensitively after stripping parameters. An
/// explicit token wins over `*`, and a `q=0` weight rejects.
pub fn accepts_encoding<'a>(values: impl IntoIterator<Item = &'a str>, encoding: &str) -> bool {
    let mut wildcard = None;

    for value in values {
        for item in value.split(',') {
            let mut parts = item.split(';');
            let token = parts.next().unwrap_or("").trim();
            if token.is_empty() {
                continue;
            }
            let accepted = quality(parts) > 0.0;

            if token.eq_ignore_ascii_case(encoding) {
                return accepted;
            }
            if token == "*" {
                wildcard = Some(accepted);
            }
        }
    }

    wildcard.unwrap_or(false)
}

fn quality<'a>(params: impl Iterator<Item = &'a str>) -> f32 {
    for param in params {
        let param = param.trim();
        if let Some(q) = param
            .strip_prefix("q=")
            .or_else(|| param.strip_prefix("Q="))
        {
            return q.trim().parse().unwrap_or(1.0);
        }
    }
    1.0
}

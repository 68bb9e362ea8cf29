//! Request envelope and fluent builder.

use crate::error::BoxError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Multi-valued string map used for headers and params.
pub type MultivaluedMap = HashMap<String, Vec<String>>;

/// A decoded response object, downcastable to its concrete type.
pub type Decoded = Box<dyn Any + Send + Sync>;

/// Produces the wire bytes for a typed request body.
pub trait BodyProvider: Send + Sync {
    /// Encode `value` into request body bytes.
    fn body(&self, value: &serde_json::Value) -> Result<Vec<u8>, BoxError>;
}

/// Decodes a raw response body into a typed object.
pub trait ResponseDecoder: Send + Sync {
    /// Decode `data` into a typed object.
    fn decode(&self, data: &[u8]) -> Result<Decoded, BoxError>;
}

/// Decoder that deserializes the body as JSON into `T`.
pub struct JsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    /// Create a JSON decoder for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResponseDecoder for JsonDecoder<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn decode(&self, data: &[u8]) -> Result<Decoded, BoxError> {
        let value: T = serde_json::from_slice(data)?;
        Ok(Box::new(value))
    }
}

/// Decoder backed by a plain function.
pub struct FnDecoder<F>(F);

impl<F> FnDecoder<F>
where
    F: Fn(&[u8]) -> Result<Decoded, BoxError> + Send + Sync,
{
    /// Wrap a decode function.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ResponseDecoder for FnDecoder<F>
where
    F: Fn(&[u8]) -> Result<Decoded, BoxError> + Send + Sync,
{
    fn decode(&self, data: &[u8]) -> Result<Decoded, BoxError> {
        (self.0)(data)
    }
}

/// Request body: raw bytes, or a typed value encoded at dispatch time.
#[derive(Debug, Clone)]
pub enum Body {
    /// Raw bytes sent as-is.
    Raw(Bytes),
    /// Typed value, encoded by the request's [`BodyProvider`] or serialized
    /// as JSON when none is set.
    Typed(serde_json::Value),
}

/// One call's worth of request data, immutable after `build()`.
#[derive(Clone, Default)]
pub struct GoxRequest {
    /// Request headers.
    pub headers: MultivaluedMap,
    /// Path template substitutions.
    pub path_params: MultivaluedMap,
    /// Query parameters.
    pub query_params: MultivaluedMap,
    /// Request body, if any.
    pub body: Option<Body>,
    /// Encoder for typed bodies.
    pub body_provider: Option<Arc<dyn BodyProvider>>,
    /// Decoder applied to acceptable responses.
    pub response_decoder: Option<Arc<dyn ResponseDecoder>>,
    /// Serialization failure captured by [`GoxRequestBuilder::typed_body`],
    /// surfaced from [`resolve_body`](Self::resolve_body) so the call fails in
    /// the build phase instead of going to the wire body-less.
    #[doc(hidden)]
    pub body_error: Option<Arc<serde_json::Error>>,
}

impl GoxRequest {
    /// Start building a request.
    pub fn builder() -> GoxRequestBuilder {
        GoxRequestBuilder::default()
    }

    /// Resolve the configured body into wire bytes.
    pub(crate) fn resolve_body(&self) -> Result<Option<Vec<u8>>, BoxError> {
        if let Some(e) = &self.body_error {
            return Err(Box::new(Arc::clone(e)));
        }
        match &self.body {
            None => Ok(None),
            Some(Body::Raw(bytes)) => Ok(Some(bytes.to_vec())),
            Some(Body::Typed(value)) => match &self.body_provider {
                Some(provider) => provider.body(value).map(Some),
                None => Ok(Some(serde_json::to_vec(value)?)),
            },
        }
    }
}

impl fmt::Debug for GoxRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoxRequest")
            .field("headers", &self.headers)
            .field("path_params", &self.path_params)
            .field("query_params", &self.query_params)
            .field("body", &self.body)
            .field("has_body_provider", &self.body_provider.is_some())
            .field("has_response_decoder", &self.response_decoder.is_some())
            .field("body_error", &self.body_error)
            .finish()
    }
}

/// Fluent builder for [`GoxRequest`]; setters may run in any order.
#[derive(Default)]
pub struct GoxRequestBuilder {
    request: GoxRequest,
}

impl GoxRequestBuilder {
    /// Set `content-type: application/json`.
    pub fn content_type_json(self) -> Self {
        self.header("content-type", "application/json")
    }

    /// Add a header value (multi-valued, appends).
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.request
            .headers
            .entry(name.into())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Add a path parameter substituted into `{name}` template segments.
    pub fn path_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.request
            .path_params
            .entry(name.into())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Add a query parameter (multi-valued, appends).
    pub fn query_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.request
            .query_params
            .entry(name.into())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Set the body as raw bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = Some(Body::Raw(body.into()));
        self
    }

    /// Set a typed body, encoded at dispatch time.
    pub fn typed_body<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.request.body = Some(Body::Typed(value)),
            Err(e) => {
                tracing::error!(error = %e, "failed to capture typed request body");
                self.request.body_error = Some(Arc::new(e));
            }
        }
        self
    }

    /// Set the encoder used for typed bodies.
    pub fn body_provider(mut self, provider: impl BodyProvider + 'static) -> Self {
        self.request.body_provider = Some(Arc::new(provider));
        self
    }

    /// Set the decoder applied to acceptable responses.
    pub fn response_decoder(mut self, decoder: impl ResponseDecoder + 'static) -> Self {
        self.request.response_decoder = Some(Arc::new(decoder));
        self
    }

    /// Finish building.
    pub fn build(self) -> GoxRequest {
        self.request
    }
}

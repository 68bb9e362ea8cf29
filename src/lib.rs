//! # gox-http
//!
//! A declarative HTTP client runtime: register named API endpoints (method,
//! path, server, timeout, concurrency, retry policy, acceptable status codes)
//! and invoke them by name instead of constructing requests directly. Each
//! endpoint gets a resilience layer composed from its descriptor: client-side
//! timeout plus retry budget, a circuit breaker with bounded concurrency, a
//! stable error taxonomy, and runtime hot reload of any endpoint without
//! disrupting in-flight calls.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gox_http::{Config, GoxHttpContext, GoxRequest, JsonDecoder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_yaml_str(
//!         r#"
//! servers:
//!   jsonplaceholder:
//!     host: jsonplaceholder.typicode.com
//!     port: 443
//!     https: true
//!
//! apis:
//!   getPosts:
//!     method: GET
//!     path: /posts/{id}
//!     server: jsonplaceholder
//!     timeout: 1000
//!     retry_count: 2
//!     retry_initial_wait_time_ms: 10
//! "#,
//!     )?;
//!
//!     let context = GoxHttpContext::new(config)?;
//!
//!     let request = GoxRequest::builder()
//!         .path_param("id", 1)
//!         .response_decoder(JsonDecoder::<serde_json::Value>::new())
//!         .build();
//!
//!     let response = context.execute("getPosts", &request).await?;
//!     println!("status: {}", response.status_code);
//!     Ok(())
//! }
//! ```
//!
//! ## Hot Reload
//!
//! ```rust,no_run
//! # use gox_http::{Api, GoxHttpContext};
//! # fn reload(context: &GoxHttpContext) -> Result<(), Box<dyn std::error::Error>> {
//! let updated = Api {
//!     name: "getPosts".to_string(),
//!     path: "/posts-v2/{id}".to_string(),
//!     server: "jsonplaceholder".to_string(),
//!     timeout_ms: 1000,
//!     ..Default::default()
//! };
//! // In-flight calls complete on their pre-reload command; the circuit
//! // breaker keeps its statistics across the swap.
//! context.reload_api(updated)?;
//! # Ok(())
//! # }
//! ```
//!
//! Every failure surfaces as a [`GoxHttpError`] with a stable machine-readable
//! [`ErrorCode`] (`command_not_found`, `request_timeout_on_client`,
//! `hystrix_circuit_open`, ...) alongside whatever response data was
//! available, so callers never see a bare transport error.

mod circuit_breaker;
mod command;
mod context;
mod descriptor;
mod error;
mod request;
mod resilient;
mod response;

pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use command::MetricsHook;
pub use context::{GoxHttpContext, GoxHttpContextBuilder};
pub use descriptor::{Api, Apis, Config, Server, Servers};
pub use error::{BoxError, ErrorCode, GoxError, GoxHttpError};
pub use request::{
    Body, BodyProvider, Decoded, FnDecoder, GoxRequest, GoxRequestBuilder, JsonDecoder,
    MultivaluedMap, ResponseDecoder,
};
pub use resilient::{BreakerOverrides, BreakerOverridesBuilder};
pub use response::GoxResponse;

// Re-export common types
pub use bytes::Bytes;
pub use http::{Method, StatusCode};

/// Prelude for common imports.
///
/// ```
/// use gox_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::context::{GoxHttpContext, GoxHttpContextBuilder};
    pub use crate::descriptor::{Api, Config, Server};
    pub use crate::error::{ErrorCode, GoxError, GoxHttpError};
    pub use crate::request::{GoxRequest, GoxRequestBuilder, JsonDecoder, ResponseDecoder};
    pub use crate::resilient::BreakerOverrides;
    pub use crate::response::GoxResponse;
}

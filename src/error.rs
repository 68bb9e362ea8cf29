//! Error taxonomy for gox-http.
//!
//! Every failure path in this crate surfaces as a [`GoxHttpError`]: a fully
//! classified error carrying a stable machine-readable [`ErrorCode`], an
//! HTTP-status-like code for caller ergonomics, and whatever response body
//! was available when the failure happened. Registry construction and reload
//! failures use the separate [`GoxError`] enum.

use bytes::Bytes;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error type used for underlying causes.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Stable machine-readable error codes.
///
/// The string forms are part of the public contract and never change; callers
/// are expected to match on them (or on the enum) to drive fallback logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// API name is not registered in the context.
    CommandNotFound,
    /// Header or body construction failed before any network call.
    FailedToBuildRequest,
    /// Transport-level client timeout.
    RequestTimeoutOnClient,
    /// Any other transport-level failure.
    RequestFailedOnClient,
    /// Response status outside the API's acceptable set.
    ServerResponseWithError,
    /// Decode failure on an otherwise-acceptable response.
    FailedToBuildResponse,
    /// Circuit breaker is open; the call was short-circuited.
    CircuitOpen,
    /// The resilience wrapper's timeout fired before the wrapped call returned.
    CircuitTimeout,
    /// The per-API concurrency ceiling rejected the call.
    CircuitRejected,
    /// Any other resilience-layer failure.
    CircuitUnknown,
}

impl ErrorCode {
    /// Stable string form of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandNotFound => "command_not_found",
            Self::FailedToBuildRequest => "failed_to_build_request",
            Self::RequestTimeoutOnClient => "request_timeout_on_client",
            Self::RequestFailedOnClient => "request_failed_on_client",
            Self::ServerResponseWithError => "server_response_with_error",
            Self::FailedToBuildResponse => "failed_to_build_response_using_response_builder",
            Self::CircuitOpen => "hystrix_circuit_open",
            Self::CircuitTimeout => "hystrix_timeout",
            Self::CircuitRejected => "hystrix_rejected",
            Self::CircuitUnknown => "hystrix_unknown_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified error returned by every failing call.
///
/// A `GoxHttpError` always carries a status code and an [`ErrorCode`]; the
/// underlying transport error (if any) is kept as `source`, and the raw
/// response body (if one was received) is kept as `body` so callers can still
/// inspect unacceptable or undecodable responses.
#[derive(Debug)]
pub struct GoxHttpError {
    /// Underlying cause, if any.
    pub source: Option<BoxError>,
    /// HTTP status code, or an HTTP-like code for local failures.
    pub status_code: u16,
    /// Human-readable message for debugging.
    pub message: String,
    /// Stable machine-readable code.
    pub error_code: ErrorCode,
    /// Raw response body snapshot, when a response was received.
    pub body: Option<Bytes>,
}

impl GoxHttpError {
    /// Create a new classified error.
    pub fn new(error_code: ErrorCode, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            source: None,
            status_code,
            message: message.into(),
            error_code,
            body: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the raw response body snapshot.
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Response body as a lossy string, when present.
    pub fn body_as_string(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    /// True when the status code is in the 2xx class.
    pub fn is_2xx(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// True when the status code is in the 4xx class.
    pub fn is_4xx(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// True when the status code is in the 5xx class.
    pub fn is_5xx(&self) -> bool {
        (500..600).contains(&self.status_code)
    }

    /// True when the call was short-circuited by an open circuit.
    pub fn is_circuit_open_error(&self) -> bool {
        self.error_code == ErrorCode::CircuitOpen
    }

    /// True when the resilience wrapper's timeout fired.
    pub fn is_circuit_timeout_error(&self) -> bool {
        self.error_code == ErrorCode::CircuitTimeout
    }

    /// True when the concurrency ceiling rejected the call.
    pub fn is_rejected_error(&self) -> bool {
        self.error_code == ErrorCode::CircuitRejected
    }

    /// True when the failure originated in the resilience layer rather than
    /// the call itself.
    pub fn is_resilience_error(&self) -> bool {
        matches!(
            self.error_code,
            ErrorCode::CircuitOpen
                | ErrorCode::CircuitTimeout
                | ErrorCode::CircuitRejected
                | ErrorCode::CircuitUnknown
        )
    }
}

impl fmt::Display for GoxHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self
            .body_as_string()
            .unwrap_or_else(|| "<no body from server>".to_string());
        write!(
            f,
            "statusCode={}, message={}, body={}, errorCode={}",
            self.status_code, self.message, body, self.error_code
        )?;
        if let Some(source) = &self.source {
            write!(f, ", err={source}")?;
        }
        Ok(())
    }
}

impl StdError for GoxHttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.source {
            Some(e) => Some(&**e),
            None => None,
        }
    }
}

/// Errors raised while building or reloading the registry.
#[derive(Debug, Error)]
pub enum GoxError {
    /// Referenced server name does not exist in the configuration.
    #[error("server not found with name {0}")]
    ServerNotFound(String),

    /// API name does not exist in the configuration.
    #[error("api not found with name {0}")]
    ApiNotFound(String),

    /// A descriptor failed basic validation.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Transport client construction failed for an API.
    #[error("failed to create http command: api={api}")]
    CommandSetup {
        /// API whose command could not be built.
        api: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// YAML configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::CommandNotFound.as_str(), "command_not_found");
        assert_eq!(ErrorCode::CircuitOpen.as_str(), "hystrix_circuit_open");
        assert_eq!(ErrorCode::CircuitTimeout.as_str(), "hystrix_timeout");
        assert_eq!(ErrorCode::CircuitRejected.as_str(), "hystrix_rejected");
        assert_eq!(ErrorCode::CircuitUnknown.as_str(), "hystrix_unknown_error");
        assert_eq!(
            ErrorCode::FailedToBuildResponse.as_str(),
            "failed_to_build_response_using_response_builder"
        );
    }

    #[test]
    fn test_display_includes_body_and_code() {
        let err = GoxHttpError::new(ErrorCode::ServerResponseWithError, 500, "server error")
            .with_body(Bytes::from_static(b"boom"));
        let rendered = err.to_string();
        assert!(rendered.contains("statusCode=500"));
        assert!(rendered.contains("body=boom"));
        assert!(rendered.contains("errorCode=server_response_with_error"));
    }

    #[test]
    fn test_display_without_body() {
        let err = GoxHttpError::new(ErrorCode::RequestTimeoutOnClient, 408, "request timeout");
        assert!(err.to_string().contains("<no body from server>"));
        assert!(err.is_4xx());
        assert!(!err.is_resilience_error());
    }

    #[test]
    fn test_resilience_error_helpers() {
        let err = GoxHttpError::new(ErrorCode::CircuitRejected, 400, "hystrix rejected");
        assert!(err.is_rejected_error());
        assert!(err.is_resilience_error());
        assert!(!err.is_circuit_open_error());
    }
}

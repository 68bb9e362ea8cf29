//! Response envelope.

use crate::request::Decoded;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fmt;

/// Outcome of a successful (acceptable) call.
///
/// Failure outcomes are carried by [`crate::GoxHttpError`] instead; the error
/// keeps the raw body and status so callers can inspect unacceptable or
/// undecodable responses too.
pub struct GoxResponse {
    /// HTTP status code of the response.
    pub status_code: u16,
    /// Raw response body.
    pub body: Bytes,
    /// Object produced by the request's response decoder, when one was set
    /// and the body was non-empty.
    pub decoded: Option<Decoded>,
}

impl GoxResponse {
    /// Borrow the decoded object as `T`, when present and of that type.
    pub fn decoded_as<T: 'static>(&self) -> Option<&T> {
        self.decoded.as_ref()?.downcast_ref::<T>()
    }

    /// Parse the raw body as JSON into `T`, independent of any decoder.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Raw body as a lossy string.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// True when the status code is in the 2xx class.
    pub fn is_2xx(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl fmt::Display for GoxResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "statusCode={}", self.status_code)
        } else {
            write!(
                f,
                "statusCode={}, body={}",
                self.status_code,
                String::from_utf8_lossy(&self.body)
            )
        }
    }
}

impl fmt::Debug for GoxResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoxResponse")
            .field("status_code", &self.status_code)
            .field("body_len", &self.body.len())
            .field("has_decoded", &self.decoded.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decoded_as_downcasts() {
        let response = GoxResponse {
            status_code: 200,
            body: Bytes::from_static(br#"{"status":"ok"}"#),
            decoded: Some(Box::new(json!({"status": "ok"}))),
        };
        let value = response.decoded_as::<serde_json::Value>().unwrap();
        assert_eq!(value["status"], "ok");
        assert!(response.decoded_as::<String>().is_none());
    }

    #[test]
    fn test_json_parses_raw_body() {
        let response = GoxResponse {
            status_code: 200,
            body: Bytes::from_static(br#"{"n":42}"#),
            decoded: None,
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["n"], 42);
        assert!(response.is_2xx());
    }

    #[test]
    fn test_display() {
        let response = GoxResponse {
            status_code: 204,
            body: Bytes::new(),
            decoded: None,
        };
        assert_eq!(response.to_string(), "statusCode=204");
    }
}

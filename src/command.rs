//! Plain HTTP command: one call for one (server, API) pair.
//!
//! The command turns every possible outcome into a classified result. A
//! transport error never escapes unclassified; an unacceptable status or a
//! decode failure still carries the raw body and status for inspection.

use crate::descriptor::{Api, Server};
use crate::error::{ErrorCode, GoxError, GoxHttpError};
use crate::request::GoxRequest;
use crate::response::GoxResponse;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Instrument};
use url::Url;

/// Callback invoked once per call with (server, api, status, error code).
pub type MetricsHook = Arc<dyn Fn(&str, &str, u16, Option<&str>) + Send + Sync>;

/// Executes one request against one (server, API) descriptor pair.
pub(crate) struct HttpCommand {
    server: Server,
    api: Api,
    client: reqwest::Client,
    metrics: Option<MetricsHook>,
}

impl HttpCommand {
    /// Build a command and its transport client from descriptors.
    ///
    /// The transport timeout is the API's raw `timeout_ms`; it bounds each
    /// attempt, while the composed timeout bounds the resilience layer above.
    pub(crate) fn new(
        server: &Server,
        api: &Api,
        metrics: Option<MetricsHook>,
    ) -> Result<Self, GoxError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(server.connect_timeout_ms))
            .timeout(Duration::from_millis(api.timeout_ms))
            .build()
            .map_err(|e| GoxError::CommandSetup {
                api: api.name.clone(),
                source: Box::new(e),
            })?;

        Ok(Self {
            server: server.clone(),
            api: api.clone(),
            client,
            metrics,
        })
    }

    pub(crate) async fn execute(&self, request: &GoxRequest) -> Result<GoxResponse, GoxHttpError> {
        let span = tracing::debug_span!(
            "gox_http_call",
            api = %self.api.name,
            server = %self.server.name,
        );
        let result = self.execute_with_retry(request).instrument(span).await;
        self.emit_metrics(&result);
        result
    }

    /// Run the call with the API's retry sub-policy.
    ///
    /// Retries target unacceptable outcomes only: the loop stops the moment a
    /// received status is in the acceptable set, even when that status is not
    /// 2xx. Build failures are deterministic and never retried.
    async fn execute_with_retry(&self, request: &GoxRequest) -> Result<GoxResponse, GoxHttpError> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = self.execute_once(request).await;
            let retryable = match &outcome {
                Ok(_) => false,
                Err(e) => matches!(
                    e.error_code,
                    ErrorCode::RequestTimeoutOnClient
                        | ErrorCode::RequestFailedOnClient
                        | ErrorCode::ServerResponseWithError
                ),
            };

            if !retryable || attempt >= self.api.retry_count {
                return outcome;
            }

            attempt += 1;
            info!(api = %self.api.name, attempt, "retrying api after error");
            let delay = self.retry_delay(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Exponential backoff from the configured initial wait, capped at 2s.
    fn retry_delay(&self, attempt: u32) -> Duration {
        let initial = self.api.initial_retry_wait_time_ms;
        if initial == 0 {
            return Duration::ZERO;
        }
        let millis = initial.saturating_mul(1u64 << (attempt - 1).min(16));
        Duration::from_millis(millis).min(Duration::from_secs(2))
    }

    async fn execute_once(&self, request: &GoxRequest) -> Result<GoxResponse, GoxHttpError> {
        let req = self.build_request(request)?;

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => return Err(classify_transport_error(e)),
        };

        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        debug!(status, body_len = body.len(), "received response");

        if !self.api.is_code_acceptable(status) {
            return Err(GoxHttpError::new(
                ErrorCode::ServerResponseWithError,
                status,
                "got response from server with error",
            )
            .with_body(body));
        }

        let decoded = match &request.response_decoder {
            Some(decoder) if !body.is_empty() => match decoder.decode(&body) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    return Err(GoxHttpError::new(
                        ErrorCode::FailedToBuildResponse,
                        status,
                        "failed to create response using response decoder",
                    )
                    .with_source(e)
                    .with_body(body));
                }
            },
            _ => None,
        };

        Ok(GoxResponse {
            status_code: status,
            body,
            decoded,
        })
    }

    /// Build-phase: URL, headers, and body. A failure here classifies as
    /// `failed_to_build_request` and no network call is made.
    fn build_request(&self, request: &GoxRequest) -> Result<reqwest::RequestBuilder, GoxHttpError> {
        let url = self.build_url(request)?;
        debug!(url = %url, "url to use");

        let method = Method::from_bytes(self.api.method.to_uppercase().as_bytes())
            .map_err(|e| failed_to_build_request("invalid http method").with_source(e))?;

        let mut req = self.client.request(method, url);

        let mut has_content_type = false;
        for (name, values) in &request.headers {
            if name.eq_ignore_ascii_case("content-type") {
                has_content_type = true;
            }
            for value in values {
                req = req.header(name.as_str(), value.as_str());
            }
        }
        // Default to JSON unless the caller set a content type
        if !has_content_type {
            req = req.header("content-type", "application/json");
        }

        match request.resolve_body() {
            Ok(Some(body)) => req = req.body(body),
            Ok(None) => {}
            Err(e) => {
                return Err(failed_to_build_request("failed to build request body").with_source(e));
            }
        }

        Ok(req)
    }

    fn build_url(&self, request: &GoxRequest) -> Result<Url, GoxHttpError> {
        let mut path = self.api.path.clone();
        for (name, values) in &request.path_params {
            if let Some(value) = values.first() {
                path = path.replace(&format!("{{{name}}}"), value);
            }
        }

        let scheme = if self.server.https { "https" } else { "http" };
        let base = format!(
            "{}://{}:{}{}",
            scheme, self.server.host, self.server.port, path
        );
        let mut url = Url::parse(&base)
            .map_err(|e| failed_to_build_request("failed to build request url").with_source(e))?;

        if !request.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, values) in &request.query_params {
                for value in values {
                    pairs.append_pair(name, value);
                }
            }
        }

        Ok(url)
    }

    fn emit_metrics(&self, result: &Result<GoxResponse, GoxHttpError>) {
        let Some(hook) = &self.metrics else {
            return;
        };
        match result {
            Ok(response) => hook(&self.server.name, &self.api.name, response.status_code, None),
            Err(e) => hook(
                &self.server.name,
                &self.api.name,
                e.status_code,
                Some(e.error_code.as_str()),
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn api(&self) -> &Api {
        &self.api
    }
}

fn failed_to_build_request(message: &str) -> GoxHttpError {
    GoxHttpError::new(ErrorCode::FailedToBuildRequest, 500, message)
}

fn classify_transport_error(e: reqwest::Error) -> GoxHttpError {
    if e.is_timeout() {
        GoxHttpError::new(
            ErrorCode::RequestTimeoutOnClient,
            408,
            "request timeout on client",
        )
        .with_source(e)
    } else {
        GoxHttpError::new(
            ErrorCode::RequestFailedOnClient,
            400,
            "request failed on client",
        )
        .with_source(e)
    }
}

//! HTTP transport over the jobs REST API.
//!
//! Requests go to `{host}/api/{version}{path}` with a bearer token. Transient
//! failures are retried here with exponential backoff so callers above never
//! retry transport errors themselves:
//! - GET: connection errors, timeouts, 429 and 503
//! - POST: 429 only (the request was rejected before it ran)

use std::time::Duration;

use jobctl_protocol::{ApiError, ApiVersion};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};

use super::{Transport, TransportError};

/// Header carrying a per-request correlation id.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Workspace URL, e.g. `https://example.cloud.databricks.com`
    pub host: String,
    /// Bearer token
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Maximum retries for transient failures
    pub max_retries: u32,
    /// Initial retry delay
    pub retry_initial_delay: Duration,
    /// Maximum retry delay
    pub retry_max_delay: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: None,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(15),
            max_retries: 3,
            retry_initial_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(10),
        }
    }
}

/// Blocking HTTP transport
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: Client,
}

impl HttpTransport {
    /// Build the transport and its HTTP client
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        if config.host.trim().is_empty() {
            return Err(TransportError::Http("host must not be empty".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("jobctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn url(&self, version: ApiVersion, path: &str) -> String {
        format!(
            "{}/api/{}{}",
            self.config.host.trim_end_matches('/'),
            version.as_str(),
            path
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config
            .retry_initial_delay
            .saturating_mul(factor)
            .min(self.config.retry_max_delay)
    }

    /// Send a request, retrying transient failures
    fn execute<F>(&self, build: F, idempotent: bool) -> Result<Value, TransportError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request_id = uuid::Uuid::new_v4().to_string();
            let result = self
                .authorize(build())
                .header(REQUEST_ID_HEADER, &request_id)
                .send();

            match result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if is_transient(status, idempotent) && attempt <= self.config.max_retries {
                        let delay = self.calculate_backoff(attempt);
                        tracing::warn!(%request_id, status, attempt, ?delay, "transient response, retrying");
                        std::thread::sleep(delay);
                        continue;
                    }
                    let body = response
                        .text()
                        .map_err(|e| TransportError::Http(e.to_string()))?;
                    tracing::debug!(%request_id, status, "response received");
                    return decode_response(status, &body);
                }
                Err(e) if idempotent && (e.is_connect() || e.is_timeout()) => {
                    if attempt > self.config.max_retries {
                        return Err(TransportError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay = self.calculate_backoff(attempt);
                    tracing::warn!(%request_id, attempt, ?delay, error = %e, "request failed, retrying");
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(TransportError::Http(e.to_string())),
            }
        }
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        version: ApiVersion,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let url = self.url(version, path);
        tracing::debug!(%url, "GET");
        self.execute(|| self.client.get(&url).query(query), true)
    }

    fn post(&self, version: ApiVersion, path: &str, body: &Value) -> Result<Value, TransportError> {
        let url = self.url(version, path);
        tracing::debug!(%url, "POST");
        self.execute(|| self.client.post(&url).json(body), false)
    }
}

/// Whether a response status is worth retrying.
///
/// 429 means the request was refused before it ran, so any method may be
/// resent. 503 may arrive after a POST took effect; only reads retry it.
fn is_transient(status: u16, idempotent: bool) -> bool {
    match status {
        429 => true,
        503 => idempotent,
        _ => false,
    }
}

/// Turn a status and body into a JSON value or a structured API error.
///
/// Some endpoints answer with a success status and an error-shaped body
/// (`error_code` and `message` only); those are errors too, keeping the
/// status they arrived with.
pub(crate) fn decode_response(status: u16, body: &str) -> Result<Value, TransportError> {
    if !(200..300).contains(&status) {
        return Err(ApiError::from_body(status, body).into());
    }
    if body.trim().is_empty() {
        return Ok(json!({}));
    }

    let value: Value = serde_json::from_str(body)?;
    if is_error_shaped(&value) {
        return Err(ApiError::from_body(status, body).into());
    }
    Ok(value)
}

fn is_error_shaped(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => {
            map.get("error_code").map(Value::is_string).unwrap_or(false)
                && map.keys().all(|k| k == "error_code" || k == "message")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(HttpTransportConfig {
            host: "https://jobs.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_includes_version() {
        let t = transport();
        assert_eq!(
            t.url(ApiVersion::Legacy, "/jobs/get"),
            "https://jobs.example.com/api/2.0/jobs/get"
        );
        assert_eq!(
            t.url(ApiVersion::MultiTask, "/jobs/get"),
            "https://jobs.example.com/api/2.1/jobs/get"
        );
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(HttpTransport::new(HttpTransportConfig::default()).is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let t = transport();
        assert_eq!(t.calculate_backoff(1), Duration::from_millis(500));
        assert_eq!(t.calculate_backoff(2), Duration::from_millis(1000));
        assert_eq!(t.calculate_backoff(3), Duration::from_millis(2000));
        assert_eq!(t.calculate_backoff(10), Duration::from_secs(10));
    }

    #[test]
    fn test_transient_statuses() {
        // GET
        assert!(is_transient(503, true));
        assert!(is_transient(429, true));
        // POST
        assert!(is_transient(429, false));
        assert!(!is_transient(503, false));

        for status in [200, 400, 404, 500, 502] {
            assert!(!is_transient(status, true));
            assert!(!is_transient(status, false));
        }
    }

    #[test]
    fn test_decode_success_body() {
        let value = decode_response(200, r#"{"job_id": 3}"#).unwrap();
        assert_eq!(value["job_id"], 3);
        assert_eq!(decode_response(200, "").unwrap(), json!({}));
    }

    #[test]
    fn test_decode_error_status() {
        let err = decode_response(
            404,
            r#"{"error_code":"RESOURCE_DOES_NOT_EXIST","message":"Run 5 does not exist."}"#,
        )
        .unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_decode_error_shaped_success() {
        let err = decode_response(
            200,
            r#"{"error_code":"INVALID_PARAMETER_VALUE","message":"Job 123 does not exist."}"#,
        )
        .unwrap_err();
        let api = err.api().unwrap();
        assert_eq!(api.status_code, 200);
        assert_eq!(api.message, "Job 123 does not exist.");
    }

    #[test]
    fn test_decode_ignores_error_code_inside_payload() {
        let value = decode_response(200, r#"{"job_id": 1, "error_code": "X"}"#).unwrap();
        assert_eq!(value["job_id"], 1);
    }
}

//! Outbound HTTP.
//!
//! The engine talks to the Opacity API for the init handshake and for flow
//! calls. Hosts may bring their own stack; desktop builds use reqwest.
//! An [`HttpClient`] sends exactly one request per call. Retries belong to
//! the caller, driven by a [`RetryPolicy`].

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(body)
            .map_err(|e| BridgeError::OperationFailed(format!("Cannot encode request body: {}", e)))?;
        self.body = Some(Bytes::from(encoded));
        Ok(self.header("Content-Type", "application/json"))
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Status and body of a completed exchange. Non-2xx statuses are responses,
/// not errors.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BridgeError::OperationFailed(format!("Cannot decode response body: {}", e)))
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 or 403: the credentials or session sent were refused.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// 429 and 5xx are worth another attempt; other statuses are final.
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

/// How often and how patiently a caller retries.
///
/// Delays double from `initial_delay` up to `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// One attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Transport for outbound requests.
///
/// Implementations own TLS and connection pooling. Failing to get any
/// response (DNS, connect, timeout) is an error.
///
/// ```ignore
/// let request = HttpRequest::new(HttpMethod::Post, "https://api.opacity.network/api/v1/sdk/handshake")
///     .bearer_token(api_key)
///     .json(&body)?;
/// let status = client.execute(request).await?.status;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::new(HttpMethod::Post, "https://api.opacity.network/api/v1/flows/github:profile")
            .bearer_token("sk_test")
            .json(&serde_json::json!({"params": {}}))
            .unwrap()
            .timeout(Duration::from_secs(30));

        assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer sk_test"));
        assert_eq!(request.headers.get("Content-Type").map(String::as_str), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(br#"{"params":{}}"#.as_slice()));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_response_classification() {
        assert!(HttpResponse::new(204, "").is_success());
        assert!(HttpResponse::new(403, "").is_auth_rejection());
        assert!(!HttpResponse::new(404, "").is_auth_rejection());
        assert!(HttpResponse::new(429, "").is_retryable());
        assert!(HttpResponse::new(503, "").is_retryable());
        assert!(!HttpResponse::new(400, "").is_retryable());
        assert_eq!(HttpResponse::new(500, vec![0x6f, 0xff]).text(), "o\u{fffd}");
    }

    #[test]
    fn test_retry_schedule() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };

        let delays: Vec<_> = (1..=3).map(|a| policy.delay_after(a)).collect();
        assert_eq!(
            delays,
            [100, 200, 350].map(Duration::from_millis).to_vec()
        );
        assert!(policy.allows_retry_after(3));
        assert!(!policy.allows_retry_after(4));
        assert!(!RetryPolicy::none().allows_retry_after(1));
    }
}

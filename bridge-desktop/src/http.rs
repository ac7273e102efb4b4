//! `HttpClient` on reqwest with rustls.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("opacity-core/", env!("CARGO_PKG_VERSION"));

/// Default whole-request timeout; a request's own timeout overrides it.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled reqwest client. One request per `execute`; retry is the engine's job.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map(Self::with_client)
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client unavailable: {}", e)))
    }

    /// Wrap a preconfigured reqwest client, e.g. one with a proxy.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        let mut builder = self.client.request(method, &request.url);
        for (key, value) in request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    let kind = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    // reqwest's Display includes the URL; keep only the cause chain head.
    let cause = std::error::Error::source(&e)
        .map(ToString::to_string)
        .unwrap_or_else(|| e.without_url().to_string());
    BridgeError::OperationFailed(format!("HTTP {}: {}", kind, cause))
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let path = core_path(&request.url).to_string();
        let response = self.prepare(request).send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;
        debug!(%path, status, bytes = body.len(), "HTTP exchange");
        Ok(HttpResponse { status, body })
    }
}

/// URL without query string or fragment.
fn core_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

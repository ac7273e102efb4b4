//! Upstream API client: the init handshake and flow execution.
//!
//! Transport errors, 429 and 5xx responses are retried per the configured
//! [`RetryPolicy`]; every other status is final.

use bridge_traits::{
    BrowserCookies, DeviceSnapshot, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::catalogue::{CompletionRule, SessionPlan};
use crate::error::{EngineError, InitError, Result};
use crate::state::Credential;

/// Version of the upstream API this engine speaks.
pub const API_VERSION: &str = "v1";

const SDK_VERSION_HEADER: &str = "X-Opacity-Sdk-Version";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_DETAIL_LEN: usize = 200;

#[derive(Debug, Serialize)]
struct HandshakeRequest<'a> {
    sdk_version: &'a str,
    device: &'a DeviceSnapshot,
}

/// Body of `POST /flows/{name}`.
#[derive(Debug, Serialize)]
pub struct FlowRequest<'a> {
    pub params: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<&'a BrowserCookies>,
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    pub intercepted: &'a [Value],
    pub device: &'a DeviceSnapshot,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowResponse {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub proof: Option<String>,
    /// Upstream needs a logged-in session before it can answer.
    #[serde(default, deserialize_with = "deserialize_session_required")]
    pub session_required: Option<SessionHint>,
}

/// Login hints sent with `session_required`. All optional; missing parts are
/// taken from the operation's own session plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionHint {
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(default)]
    pub cookie_domain: Option<String>,
    #[serde(default)]
    pub completion_url_prefix: Option<String>,
    #[serde(default)]
    pub intercept_requests: Option<bool>,
}

impl SessionHint {
    /// Merge the hint over `fallback`. `None` when neither says where to log in.
    pub fn into_plan(self, fallback: Option<&SessionPlan>) -> Option<SessionPlan> {
        let mut plan = match (self.login_url, fallback) {
            (Some(login_url), Some(base)) => SessionPlan {
                login_url,
                ..base.clone()
            },
            (Some(login_url), None) => {
                let domain = host_of(&login_url).unwrap_or_default();
                SessionPlan::new(
                    login_url.clone(),
                    domain,
                    CompletionRule::NavigatedAway(login_url),
                )
            }
            (None, Some(base)) => base.clone(),
            (None, None) => return None,
        };

        if let Some(domain) = self.cookie_domain {
            plan.cookie_domain = domain;
        }
        if let Some(prefix) = self.completion_url_prefix {
            plan.completion = CompletionRule::UrlPrefix(prefix);
        }
        if let Some(intercept) = self.intercept_requests {
            plan.intercept_requests = intercept;
        }
        Some(plan)
    }
}

/// `true`, `false`, `null` or a hint object.
fn deserialize_session_required<'de, D>(deserializer: D) -> std::result::Result<Option<SessionHint>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Hint(SessionHint),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None | Some(Raw::Flag(false)) => None,
        Some(Raw::Flag(true)) => Some(SessionHint::default()),
        Some(Raw::Hint(hint)) => Some(hint),
    })
}

/// Cookie domain of a login URL: the host, lowercased, without `www.`.
fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    Some(host.trim_start_matches("www.").to_ascii_lowercase())
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    description: Option<String>,
}

/// Human-readable detail from an error response.
fn error_detail(response: &HttpResponse) -> String {
    if let Ok(body) = response.json::<ErrorBody>() {
        match (body.code, body.description) {
            (Some(code), Some(description)) => return format!("{}: {}", code, description),
            (None, Some(description)) => return description,
            (Some(code), None) => return code,
            (None, None) => {}
        }
    }

    let text = response.text();
    let text = text.trim();
    if text.is_empty() {
        return format!("HTTP {}", response.status);
    }
    match text.char_indices().nth(MAX_DETAIL_LEN) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Client bound to one credential and base URL.
pub struct UpstreamClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    credential: Arc<Credential>,
    retry: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        credential: Arc<Credential>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Verify the API key against the selected environment.
    #[instrument(skip(self, device), fields(environment = %self.credential.environment))]
    pub async fn handshake(&self, device: &DeviceSnapshot) -> std::result::Result<(), InitError> {
        let url = format!("{}/api/{}/sdk/handshake", self.base_url, API_VERSION);
        let body = HandshakeRequest {
            sdk_version: env!("CARGO_PKG_VERSION"),
            device,
        };
        let request = self
            .request(HttpMethod::Post, url)
            .json(&body)
            .map_err(|e| InitError::HandshakeFailed(e.to_string()))?;

        let response = self
            .send(request)
            .await
            .map_err(|e| InitError::HandshakeFailed(e.to_string()))?;

        if response.is_success() {
            debug!("Handshake accepted");
            return Ok(());
        }

        let detail = error_detail(&response);
        if response.is_auth_rejection() {
            warn!(status = response.status, "Handshake rejected the API key");
            return Err(InitError::InvalidApiKey(detail));
        }
        Err(InitError::HandshakeFailed(format!(
            "HTTP {}: {}",
            response.status, detail
        )))
    }

    /// Run a flow upstream.
    #[instrument(skip(self, body), fields(operation = %name, has_session = body.session.is_some()))]
    pub async fn run_flow(&self, name: &str, body: &FlowRequest<'_>) -> Result<FlowResponse> {
        let url = format!("{}/api/{}/flows/{}", self.base_url, API_VERSION, name);
        let request = self
            .request(HttpMethod::Post, url)
            .json(body)
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        let response = self
            .send(request)
            .await
            .map_err(|e| EngineError::upstream(None, e.to_string()))?;

        if !response.is_success() {
            let detail = error_detail(&response);
            warn!(status = response.status, "Upstream flow failed");
            return Err(EngineError::upstream(Some(response.status), detail));
        }

        response.json::<FlowResponse>().map_err(|e| {
            EngineError::upstream(
                Some(response.status),
                format!("Malformed upstream response: {}", e),
            )
        })
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(self.credential.api_key())
            .header("Accept", "application/json")
            .header(SDK_VERSION_HEADER, env!("CARGO_PKG_VERSION"))
            .timeout(REQUEST_TIMEOUT)
    }

    /// Execute with retry on transport errors, 429 and 5xx.
    async fn send(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.http.execute(request.clone()).await;
            let failure = match &outcome {
                Ok(response) if response.is_retryable() => Some(format!("HTTP {}", response.status)),
                Ok(_) => None,
                Err(e) => Some(e.to_string()),
            };
            let Some(failure) = failure else {
                return outcome;
            };

            if !self.retry.allows_retry_after(attempt) {
                warn!(%failure, attempts = attempt, "Upstream request failed after retries");
                return outcome;
            }
            let delay = self.retry.delay_after(attempt);
            warn!(
                %failure,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Upstream request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

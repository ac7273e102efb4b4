//! # Interactive Browser Flows
//!
//! Drives one login through the host's browser:
//!
//! 1. Lease a browser surface (bounded by `max_concurrent_browsers`)
//! 2. Prepare, configure and present the browser for a fresh [`FlowId`]
//! 3. Wait for webview events until the plan's completion rule is met
//! 4. Capture cookies and hand the still-open browser back as a [`BrowserLease`]
//!
//! The whole sequence, including the wait for a free surface, runs under one
//! deadline. Timeout, cancellation, a user close and any host failure close
//! the browser before the error is returned.

use bridge_traits::{BrowserCookies, FlowId, HostCapabilityProvider};
use core_runtime::events::{CoreEvent, EventBus, FlowEvent};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalogue::SessionPlan;
use crate::error::{EngineError, Result};
use crate::webview::{EventRouter, FlowInbox, WebviewSignal};

/// An open browser surface. Closing is explicit; a lease dropped while open
/// closes the browser in the background.
pub struct BrowserLease {
    host: Arc<dyn HostCapabilityProvider>,
    flow: FlowId,
    permit: Option<OwnedSemaphorePermit>,
    open: bool,
}

impl BrowserLease {
    fn new(host: Arc<dyn HostCapabilityProvider>, flow: FlowId, permit: OwnedSemaphorePermit) -> Self {
        Self {
            host,
            flow,
            permit: Some(permit),
            open: true,
        }
    }

    pub fn flow(&self) -> FlowId {
        self.flow
    }

    pub async fn close(mut self) {
        self.open = false;
        if let Err(e) = self.host.close_browser(self.flow).await {
            warn!(flow = %self.flow, error = %e, "Failed to close browser");
        }
        self.permit.take();
    }

    /// Point the browser at `url` and leave it for the user to dismiss.
    /// Falls back to closing if the host cannot navigate.
    pub async fn show_error(mut self, url: &str) {
        match self.host.change_browser_url(self.flow, url).await {
            Ok(()) => {
                debug!(flow = %self.flow, "Browser left open on error page");
                self.open = false;
                self.permit.take();
            }
            Err(e) => {
                warn!(flow = %self.flow, error = %e, "Could not show error page");
                self.close().await;
            }
        }
    }
}

impl Drop for BrowserLease {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let host = Arc::clone(&self.host);
            let flow = self.flow;
            runtime.spawn(async move {
                let _ = host.close_browser(flow).await;
            });
        }
    }
}

/// Result of a completed interactive login.
pub struct CapturedSession {
    pub cookies: BrowserCookies,
    /// Payloads of `intercepted_request` events, in arrival order.
    pub intercepted: Vec<Value>,
    pub final_url: String,
    pub browser: BrowserLease,
}

/// Everything a capture needs from the engine for one request.
pub struct CaptureContext<'a> {
    pub host: &'a Arc<dyn HostCapabilityProvider>,
    pub router: &'a Arc<EventRouter>,
    pub browsers: &'a Arc<Semaphore>,
    pub events: &'a EventBus,
    pub operation: &'a str,
    pub timeout: Duration,
    pub cancel: &'a CancellationToken,
}

/// Run an interactive login per `plan`.
///
/// `flow_slot` receives the flow id as soon as one is allocated so the caller
/// can report it even when the capture fails.
pub async fn capture_session(
    ctx: &CaptureContext<'_>,
    plan: &SessionPlan,
    flow_slot: &mut Option<FlowId>,
) -> Result<CapturedSession> {
    let deadline = Instant::now() + ctx.timeout;

    let permit = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            return Err(EngineError::Cancelled("cancelled while waiting for a browser".to_string()));
        }
        _ = sleep_until(deadline) => {
            warn!(operation = ctx.operation, "No browser surface became available");
            return Err(EngineError::Timeout { after: ctx.timeout });
        }
        permit = Arc::clone(ctx.browsers).acquire_owned() => {
            permit.map_err(|_| EngineError::Internal("browser pool closed".to_string()))?
        }
    };

    let flow = FlowId::new();
    *flow_slot = Some(flow);
    let mut inbox = ctx.router.register(flow);
    let lease = BrowserLease::new(Arc::clone(ctx.host), flow, permit);

    let outcome = async {
        present(ctx, plan, &inbox).await?;
        wait_for_completion(ctx, plan, &mut inbox, deadline).await
    }
    .await;

    match outcome {
        Ok(completed) => {
            info!(
                operation = ctx.operation,
                %flow,
                cookie_count = completed.cookies.len(),
                intercepted = completed.intercepted.len(),
                "Interactive session captured"
            );
            let _ = ctx.events.emit(CoreEvent::Flow(FlowEvent::SessionCaptured {
                operation: ctx.operation.to_string(),
                flow_id: flow.to_string(),
                cookie_count: completed.cookies.len(),
            }));
            Ok(CapturedSession {
                cookies: completed.cookies,
                intercepted: completed.intercepted,
                final_url: completed.final_url,
                browser: lease,
            })
        }
        Err(e) => {
            debug!(operation = ctx.operation, %flow, error = %e, "Interactive flow ended");
            lease.close().await;
            Err(e)
        }
    }
}

async fn present(ctx: &CaptureContext<'_>, plan: &SessionPlan, inbox: &FlowInbox) -> Result<()> {
    let flow = inbox.flow();
    ctx.host.prepare_browser(flow, &plan.login_url).await?;
    if let Some(user_agent) = &plan.user_agent {
        ctx.host
            .set_browser_header(flow, "user-agent", user_agent)
            .await?;
    }
    ctx.host
        .present_browser(flow, plan.intercept_requests)
        .await?;
    inbox.mark_presented();

    debug!(
        operation = ctx.operation,
        %flow,
        intercept_requests = plan.intercept_requests,
        "Browser presented"
    );
    let _ = ctx.events.emit(CoreEvent::Flow(FlowEvent::BrowserPresented {
        operation: ctx.operation.to_string(),
        flow_id: flow.to_string(),
    }));
    Ok(())
}

struct Completed {
    cookies: BrowserCookies,
    intercepted: Vec<Value>,
    final_url: String,
}

async fn wait_for_completion(
    ctx: &CaptureContext<'_>,
    plan: &SessionPlan,
    inbox: &mut FlowInbox,
    deadline: Instant,
) -> Result<Completed> {
    let flow = inbox.flow();
    let mut intercepted = Vec::new();

    loop {
        let signal = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                return Err(EngineError::Cancelled("request cancelled".to_string()));
            }
            _ = sleep_until(deadline) => {
                warn!(operation = ctx.operation, %flow, "Interactive flow timed out");
                return Err(EngineError::Timeout { after: ctx.timeout });
            }
            signal = inbox.recv() => signal,
        };

        match signal {
            Some(WebviewSignal::Navigation { url, cookies, .. }) => {
                debug!(%flow, url = %core_runtime::logging::redact_url(&url), "Navigation");
                if let Some(cookies) = completion_cookies(ctx, plan, flow, &url, cookies).await? {
                    return Ok(Completed {
                        cookies,
                        intercepted,
                        final_url: url,
                    });
                }
            }
            Some(WebviewSignal::InterceptedRequest { data }) => {
                if plan.intercept_requests {
                    intercepted.push(data);
                } else {
                    debug!(%flow, "Ignoring intercepted request for non-intercepting flow");
                }
            }
            Some(WebviewSignal::Close) | Some(WebviewSignal::WindowClose) => {
                info!(operation = ctx.operation, %flow, "Browser closed by user");
                return Err(EngineError::Cancelled("browser closed by user".to_string()));
            }
            None => {
                return Err(EngineError::Internal("webview event channel closed".to_string()));
            }
        }
    }
}

/// Cookies for a completing navigation, or `None` while the rule is unmet.
///
/// Sources in order: the event payload, the plan's cookie domain, the
/// browser's current URL. For cookie-based rules the first source that
/// satisfies the rule wins; otherwise the first non-empty one.
async fn completion_cookies(
    ctx: &CaptureContext<'_>,
    plan: &SessionPlan,
    flow: FlowId,
    url: &str,
    from_event: Option<BrowserCookies>,
) -> Result<Option<BrowserCookies>> {
    let rule = &plan.completion;
    if !rule.needs_cookies() && !rule.is_met(url, None) {
        return Ok(None);
    }

    let mut fallback: Option<BrowserCookies> = None;
    let mut consider = |candidate: Option<BrowserCookies>| -> Option<BrowserCookies> {
        let candidate = candidate.filter(|c| !c.is_empty())?;
        if rule.is_met(url, Some(&candidate)) && rule.needs_cookies() {
            return Some(candidate);
        }
        if fallback.is_none() {
            fallback = Some(candidate);
        }
        None
    };

    if let Some(found) = consider(from_event) {
        return Ok(Some(found));
    }
    if let Some(found) = consider(
        ctx.host
            .cookies_for_domain(flow, &plan.cookie_domain)
            .await?,
    ) {
        return Ok(Some(found));
    }
    if let Some(found) = consider(ctx.host.cookies_for_current_url(flow).await?) {
        return Ok(Some(found));
    }

    if rule.needs_cookies() {
        return Ok(None);
    }
    Ok(Some(fallback.unwrap_or_default()))
}

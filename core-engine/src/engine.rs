//! # Request Engine
//!
//! Owns the engine lifecycle and executes named requests.
//!
//! ## Lifecycle
//!
//! `Uninitialized -> Initializing -> Ready | Failed`. `init` calls are
//! serialized; a `get` issued while `init` is in flight waits for the outcome.
//! `Failed` is terminal.
//!
//! ## Execution
//!
//! 1. Resolve the name (catalogue entry or generic flow) and validate params
//! 2. Dry-run: return the operation's deterministic payload
//! 3. Live: reuse a cached session or run an interactive login, call the
//!    upstream flow endpoint, retry once interactively on a rejected session
//! 4. Attach the upstream proof, or attest the result per the operation's
//!    proof policy
//!
//! Every failure is returned as an [`EngineError`] inside the result; nothing
//! panics across this boundary.

use bridge_traits::{DeviceInfo, FlowId, HostCapabilityProvider};
use core_runtime::events::{CoreEvent, EventBus, FlowEvent, LifecycleEvent, WebviewEvent};
use core_runtime::EngineConfig;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::catalogue::{generic_mock_payload, Catalogue, Execution, ProofPolicy, SessionPlan, Target};
use crate::error::{EngineError, InitError, Result};
use crate::flow::{capture_session, BrowserLease, CaptureContext, CapturedSession};
use crate::proof::{ProofClaim, ProofGenerator, Sha256Attestor};
use crate::request::{NamedRequest, OpacityPayload, OpacityResult, Params};
use crate::session_store::SessionStore;
use crate::state::{Credential, EngineState, Environment};
use crate::upstream::{FlowRequest, UpstreamClient, API_VERSION};
use crate::webview::{EventRouter, RouteOutcome, WebviewEnvelope};

struct EngineInner {
    host: Weak<dyn HostCapabilityProvider>,
    config: EngineConfig,
    events: EventBus,
    proofs: Arc<dyn ProofGenerator>,
    catalogue: Catalogue,
    state: watch::Sender<EngineState>,
    init_lock: Mutex<()>,
    router: Arc<EventRouter>,
    browsers: Arc<Semaphore>,
    sessions: SessionStore,
}

/// The engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct RequestEngine {
    inner: Arc<EngineInner>,
}

/// Builder for [`RequestEngine`].
pub struct RequestEngineBuilder {
    host: Weak<dyn HostCapabilityProvider>,
    config: Option<EngineConfig>,
    events: Option<EventBus>,
    proofs: Option<Arc<dyn ProofGenerator>>,
    catalogue: Option<Catalogue>,
}

impl RequestEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn proof_generator(mut self, proofs: Arc<dyn ProofGenerator>) -> Self {
        self.proofs = Some(proofs);
        self
    }

    pub fn catalogue(mut self, catalogue: Catalogue) -> Self {
        self.catalogue = Some(catalogue);
        self
    }

    pub fn build(self) -> core_runtime::Result<RequestEngine> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => EngineConfig::builder().build()?,
        };

        let events = self
            .events
            .unwrap_or_else(|| EventBus::new(config.event_buffer_size));
        let sessions = SessionStore::new(
            Arc::clone(&config.clock),
            config.session_ttl,
            config.session_cache,
        );
        let (state, _) = watch::channel(EngineState::Uninitialized);

        Ok(RequestEngine {
            inner: Arc::new(EngineInner {
                host: self.host,
                browsers: Arc::new(Semaphore::new(config.max_concurrent_browsers)),
                config,
                events,
                proofs: self.proofs.unwrap_or_else(|| Arc::new(Sha256Attestor)),
                catalogue: self.catalogue.unwrap_or_default(),
                state,
                init_lock: Mutex::new(()),
                router: Arc::new(EventRouter::new()),
                sessions,
            }),
        })
    }
}

/// Puts the state back to `Uninitialized` if an `init` future is dropped
/// mid-transition.
struct InitGuard<'a> {
    state: &'a watch::Sender<EngineState>,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_if_modified(|state| {
                if matches!(state, EngineState::Initializing) {
                    *state = EngineState::Uninitialized;
                    true
                } else {
                    false
                }
            });
        }
    }
}

impl RequestEngine {
    /// Start building an engine for `host`. The engine keeps only a weak
    /// reference; the host must outlive the requests it serves.
    pub fn builder(host: &Arc<dyn HostCapabilityProvider>) -> RequestEngineBuilder {
        RequestEngineBuilder {
            host: Arc::downgrade(host),
            config: None,
            events: None,
            proofs: None,
            catalogue: None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.inner.state.borrow().clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.inner.catalogue
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Version of the upstream API the engine speaks. Stateless.
    pub fn get_api_version(&self) -> &'static str {
        API_VERSION
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Initialize the engine. Live mode verifies the key with a handshake.
    ///
    /// Re-initializing a ready engine fails with `AlreadyInitialized` and
    /// leaves it ready; after a failed `init` every call fails with
    /// `Terminal`.
    #[instrument(skip(self, api_key))]
    pub async fn init(
        &self,
        api_key: &str,
        dry_run: bool,
        environment: Environment,
        show_errors_in_webview: bool,
    ) -> std::result::Result<(), InitError> {
        self.init_with(api_key, dry_run, Ok(environment), show_errors_in_webview)
            .await
    }

    /// [`init`](Self::init) with the host's integer environment code.
    #[instrument(skip(self, api_key))]
    pub async fn init_with_code(
        &self,
        api_key: &str,
        dry_run: bool,
        environment_code: i32,
        show_errors_in_webview: bool,
    ) -> std::result::Result<(), InitError> {
        self.init_with(
            api_key,
            dry_run,
            Environment::from_code(environment_code),
            show_errors_in_webview,
        )
        .await
    }

    async fn init_with(
        &self,
        api_key: &str,
        dry_run: bool,
        environment: std::result::Result<Environment, InitError>,
        show_errors_in_webview: bool,
    ) -> std::result::Result<(), InitError> {
        let inner = &self.inner;
        let _serialized = inner.init_lock.lock().await;

        let current = inner.state.borrow().clone();
        match current {
            EngineState::Ready(_) => return Err(InitError::AlreadyInitialized),
            EngineState::Failed(reason) => return Err(InitError::Terminal { reason }),
            EngineState::Uninitialized | EngineState::Initializing => {}
        }

        let environment_name = environment
            .as_ref()
            .map(|e| e.as_str())
            .unwrap_or("unknown")
            .to_string();
        inner.state.send_replace(EngineState::Initializing);
        let mut guard = InitGuard {
            state: &inner.state,
            armed: true,
        };
        let _ = inner.events.emit(CoreEvent::Lifecycle(LifecycleEvent::Initializing {
            environment: environment_name.clone(),
            dry_run,
        }));

        let outcome = self
            .establish(api_key, dry_run, environment, show_errors_in_webview)
            .await;
        guard.armed = false;

        match outcome {
            Ok(credential) => {
                info!(
                    environment = %credential.environment,
                    dry_run,
                    key = %credential.fingerprint(),
                    "Engine ready"
                );
                inner
                    .state
                    .send_replace(EngineState::Ready(Arc::new(credential)));
                let _ = inner.events.emit(CoreEvent::Lifecycle(LifecycleEvent::Ready {
                    environment: environment_name,
                    dry_run,
                }));
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!(error = %reason, "Engine initialization failed");
                inner.state.send_replace(EngineState::Failed(reason.clone()));
                let _ = inner
                    .events
                    .emit(CoreEvent::Lifecycle(LifecycleEvent::Failed { reason }));
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        api_key: &str,
        dry_run: bool,
        environment: std::result::Result<Environment, InitError>,
        show_errors_in_webview: bool,
    ) -> std::result::Result<Credential, InitError> {
        let environment = environment?;
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(InitError::InvalidApiKey(
                "API key must not be empty".to_string(),
            ));
        }

        let credential = Credential::new(api_key, environment, dry_run, show_errors_in_webview);
        if dry_run {
            debug!("Dry-run mode, skipping handshake");
            return Ok(credential);
        }

        let http = self.inner.config.require_http_client()?;
        let host = self.host().map_err(|e| InitError::CapabilityMissing {
            capability: "HostCapabilityProvider".to_string(),
            message: e.to_string(),
        })?;

        let upstream = UpstreamClient::new(
            http,
            self.base_url(environment),
            Arc::new(credential.clone()),
            self.inner.config.retry_policy.clone(),
        );
        upstream.handshake(&host.snapshot()).await?;

        Ok(credential)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Execute the named operation. `params` is an optional JSON object.
    pub async fn get(&self, name: &str, params: Option<&str>) -> OpacityResult {
        self.execute(NamedRequest::new(name, params), CancellationToken::new())
            .await
    }

    /// [`get`](Self::get) that stops with `Cancelled` once `cancel` fires.
    pub async fn get_with_cancellation(
        &self,
        name: &str,
        params: Option<&str>,
        cancel: CancellationToken,
    ) -> OpacityResult {
        self.execute(NamedRequest::new(name, params), cancel).await
    }

    #[instrument(skip(self, request, cancel), fields(operation = %request.name))]
    pub async fn execute(&self, request: NamedRequest, cancel: CancellationToken) -> OpacityResult {
        let started = Instant::now();
        let _ = self.inner.events.emit(CoreEvent::Flow(FlowEvent::Started {
            operation: request.name.clone(),
            flow_id: None,
        }));

        let mut flow_slot = None;
        let result = self.run(&request, &cancel, &mut flow_slot).await;
        let flow_id = flow_slot.map(|flow: FlowId| flow.to_string());

        let event = match &result {
            Ok(payload) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(duration_ms, has_proof = payload.proof.is_some(), "Request completed");
                FlowEvent::Completed {
                    operation: request.name.clone(),
                    has_proof: payload.proof.is_some(),
                    duration_ms,
                }
            }
            Err(EngineError::Timeout { .. }) => {
                warn!("Request timed out");
                FlowEvent::TimedOut {
                    operation: request.name.clone(),
                    flow_id,
                }
            }
            Err(EngineError::Cancelled(reason)) => {
                info!(%reason, "Request cancelled");
                FlowEvent::Cancelled {
                    operation: request.name.clone(),
                    flow_id,
                }
            }
            Err(e) => {
                warn!(code = %e.code(), error = %e, "Request failed");
                FlowEvent::Failed {
                    operation: request.name.clone(),
                    code: e.code().as_str().to_string(),
                    message: e.to_string(),
                }
            }
        };
        let _ = self.inner.events.emit(CoreEvent::Flow(event));

        result
    }

    async fn run(
        &self,
        request: &NamedRequest,
        cancel: &CancellationToken,
        flow_slot: &mut Option<FlowId>,
    ) -> OpacityResult {
        let credential = self.wait_ready(cancel).await?;
        let target = self.inner.catalogue.resolve(&request.name)?;
        let params = Params::parse(request.params.as_deref())?;

        let spec = match target {
            Target::Catalogued(spec) => {
                spec.validate(&params)?;
                Some(spec)
            }
            Target::Generic(_) => None,
        };
        let proof_policy = spec.map_or(ProofPolicy::None, |s| s.proof);

        if let Some(spec) = spec.filter(|s| s.execution == Execution::BrowserOnly) {
            let plan = spec.session.as_ref().ok_or_else(|| {
                EngineError::Internal(format!("{} has no session plan", spec.name))
            })?;
            let host = self.host()?;
            let captured = self
                .capture(&host, target.name(), plan, cancel, flow_slot)
                .await?;
            captured.browser.close().await;
            let data = spec.mock_payload(&params);
            return self.finish(target.name(), &credential, &params, data, None, proof_policy);
        }

        if credential.dry_run {
            let data = match spec {
                Some(spec) => spec.mock_payload(&params),
                None => generic_mock_payload(target.name(), &params),
            };
            return self.finish(target.name(), &credential, &params, data, None, proof_policy);
        }

        let plan = spec.and_then(|s| s.session.as_ref());
        self.run_live(target, plan, &credential, &params, proof_policy, cancel, flow_slot)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_live(
        &self,
        target: Target<'_>,
        plan: Option<&SessionPlan>,
        credential: &Arc<Credential>,
        params: &Params,
        proof_policy: ProofPolicy,
        cancel: &CancellationToken,
        flow_slot: &mut Option<FlowId>,
    ) -> OpacityResult {
        let inner = &self.inner;
        let host = self.host()?;
        let http = inner
            .config
            .require_http_client()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        let upstream = UpstreamClient::new(
            http,
            self.base_url(credential.environment),
            Arc::clone(credential),
            inner.config.retry_policy.clone(),
        );

        let name = target.name();
        let namespace = target.namespace();
        let environment = credential.environment;
        let device = host.snapshot();
        let params_value = params.to_value();

        let mut session = inner.sessions.load(&*host, namespace, environment).await;
        let mut from_cache = session.is_some();
        let mut intercepted: Vec<Value> = Vec::new();
        let mut lease: Option<BrowserLease> = None;
        let mut interactive_retry = true;

        if let (Some(plan), None) = (plan, session.as_ref()) {
            let captured = self.capture(&host, name, plan, cancel, flow_slot).await?;
            self.adopt(&host, namespace, environment, captured, &mut session, &mut intercepted, &mut lease)
                .await;
        }

        loop {
            let body = FlowRequest {
                params: &params_value,
                session: session.as_ref(),
                intercepted: &intercepted,
                device: &device,
            };
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(EngineError::Cancelled("request cancelled".to_string())),
                response = upstream.run_flow(name, &body) => response,
            };

            let relogin_plan = match outcome {
                Ok(response) => match response.session_required {
                    None => {
                        if let Some(lease) = lease.take() {
                            lease.close().await;
                        }
                        return self.finish(
                            name,
                            credential,
                            params,
                            response.data,
                            response.proof,
                            proof_policy,
                        );
                    }
                    Some(hint) if interactive_retry => hint.into_plan(plan).ok_or_else(|| {
                        EngineError::upstream(None, "session required but no login location was given")
                    }),
                    Some(_) => Err(EngineError::upstream(
                        None,
                        "session still required after interactive login",
                    )),
                },
                Err(e) if e.is_auth_rejection() && from_cache && interactive_retry => {
                    debug!(operation = name, "Cached session rejected upstream");
                    plan.cloned().ok_or(e)
                }
                Err(e) => Err(e),
            };

            let relogin_plan = match relogin_plan {
                Ok(plan) => plan,
                Err(e) => {
                    if e.is_auth_rejection() {
                        inner.sessions.invalidate(&*host, namespace, environment).await;
                    }
                    self.release_after_failure(lease.take(), credential, name, &e).await;
                    return Err(e);
                }
            };

            if from_cache {
                inner.sessions.invalidate(&*host, namespace, environment).await;
                from_cache = false;
            }
            if let Some(lease) = lease.take() {
                lease.close().await;
            }
            interactive_retry = false;

            let captured = self
                .capture(&host, name, &relogin_plan, cancel, flow_slot)
                .await?;
            self.adopt(&host, namespace, environment, captured, &mut session, &mut intercepted, &mut lease)
                .await;
        }
    }

    /// Take over a captured session: cache it and keep the browser open
    /// until the upstream call settles.
    #[allow(clippy::too_many_arguments)]
    async fn adopt(
        &self,
        host: &Arc<dyn HostCapabilityProvider>,
        namespace: &str,
        environment: Environment,
        captured: CapturedSession,
        session: &mut Option<bridge_traits::BrowserCookies>,
        intercepted: &mut Vec<Value>,
        lease: &mut Option<BrowserLease>,
    ) {
        self.inner
            .sessions
            .save(&**host, namespace, environment, &captured.cookies)
            .await;
        *session = Some(captured.cookies);
        *intercepted = captured.intercepted;
        *lease = Some(captured.browser);
    }

    async fn release_after_failure(
        &self,
        lease: Option<BrowserLease>,
        credential: &Credential,
        operation: &str,
        error: &EngineError,
    ) {
        let Some(lease) = lease else {
            return;
        };
        if credential.show_errors_in_webview && matches!(error, EngineError::UpstreamFailure { .. }) {
            let url = format!(
                "{}/sdk/error?code={}&operation={}",
                self.base_url(credential.environment),
                error.code().as_str(),
                operation
            );
            lease.show_error(&url).await;
        } else {
            lease.close().await;
        }
    }

    async fn capture(
        &self,
        host: &Arc<dyn HostCapabilityProvider>,
        operation: &str,
        plan: &SessionPlan,
        cancel: &CancellationToken,
        flow_slot: &mut Option<FlowId>,
    ) -> Result<CapturedSession> {
        let ctx = CaptureContext {
            host,
            router: &self.inner.router,
            browsers: &self.inner.browsers,
            events: &self.inner.events,
            operation,
            timeout: self.inner.config.interactive_timeout,
            cancel,
        };
        capture_session(&ctx, plan, flow_slot).await
    }

    fn finish(
        &self,
        operation: &str,
        credential: &Credential,
        params: &Params,
        data: Value,
        upstream_proof: Option<String>,
        policy: ProofPolicy,
    ) -> OpacityResult {
        let json = serde_json::to_string(&data)
            .map_err(|e| EngineError::Internal(format!("Failed to encode payload: {}", e)))?;

        let proof = match (upstream_proof, policy) {
            (Some(proof), _) => Some(proof),
            (None, ProofPolicy::Attested) => {
                let params = params.to_value();
                let fingerprint = credential.fingerprint();
                Some(self.inner.proofs.attest(&ProofClaim {
                    operation,
                    environment: credential.environment.as_str(),
                    params: &params,
                    payload: &data,
                    key_fingerprint: &fingerprint,
                    issued_at: self.inner.config.clock.now(),
                })?)
            }
            (None, ProofPolicy::None) => None,
        };

        Ok(OpacityPayload { json, proof })
    }

    async fn wait_ready(&self, cancel: &CancellationToken) -> Result<Arc<Credential>> {
        let mut state = self.inner.state.subscribe();
        loop {
            let current = state.borrow_and_update().clone();
            match current {
                EngineState::Ready(credential) => return Ok(credential),
                EngineState::Uninitialized => {
                    return Err(EngineError::InvalidState(
                        "engine is not initialized".to_string(),
                    ))
                }
                EngineState::Failed(reason) => {
                    return Err(EngineError::InvalidState(format!(
                        "initialization failed: {}",
                        reason
                    )))
                }
                EngineState::Initializing => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(EngineError::Cancelled("cancelled while waiting for init".to_string()));
                        }
                        changed = state.changed() => {
                            if changed.is_err() {
                                return Err(EngineError::Internal("engine state channel closed".to_string()));
                            }
                        }
                    }
                }
            }
        }
    }

    // ========================================================================
    // Webview events
    // ========================================================================

    /// Deliver a webview event (JSON) from the host to the flow awaiting it.
    /// Malformed and unroutable events are dropped with a log entry.
    pub fn emit_webview_event(&self, event_json: &str) {
        let envelope = match WebviewEnvelope::parse(event_json) {
            Ok(envelope) => envelope,
            Err(reason) => {
                warn!(%reason, "Dropping webview event");
                let _ = self
                    .inner
                    .events
                    .emit(CoreEvent::Webview(WebviewEvent::Dropped { reason }));
                return;
            }
        };

        let kind = envelope.signal.kind();
        match self.inner.router.route(envelope) {
            RouteOutcome::Delivered(flow) => debug!(%flow, kind, "Webview event delivered"),
            RouteOutcome::Duplicate(flow) => debug!(%flow, kind, "Duplicate webview event ignored"),
            RouteOutcome::Stale(flow) => debug!(%flow, kind, "Webview event for finished flow ignored"),
            RouteOutcome::Unroutable => {
                warn!(kind, "Webview event has no single target flow");
                let _ = self.inner.events.emit(CoreEvent::Webview(WebviewEvent::Dropped {
                    reason: format!("no single flow can take a '{}' event without flow_id", kind),
                }));
            }
        }
    }

    fn host(&self) -> Result<Arc<dyn HostCapabilityProvider>> {
        self.inner.host.upgrade().ok_or_else(|| {
            EngineError::Internal("host capability provider released".to_string())
        })
    }

    fn base_url(&self, environment: Environment) -> String {
        self.inner
            .config
            .api_base_url
            .clone()
            .unwrap_or_else(|| environment.default_base_url().to_string())
    }
}

impl std::fmt::Debug for RequestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestEngine")
            .field("state", &self.state().name())
            .field("operations", &self.inner.catalogue.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

//! Async façade over the request engine.

use bridge_traits::HostCapabilityProvider;
use core_engine::{CancellationToken, RequestEngine, API_VERSION};
use core_runtime::events::EventBus;
use core_runtime::EngineConfig;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::response::{InitStatus, OpacityResponse};

/// Version of this crate, reported by [`OpacityCore::sdk_versions`].
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Primary façade exposed to host applications.
///
/// Holds the host alive for as long as the façade exists; the engine inside
/// only keeps a weak reference.
#[derive(Clone)]
pub struct OpacityCore {
    host: Arc<dyn HostCapabilityProvider>,
    engine: RequestEngine,
}

impl OpacityCore {
    pub fn new(host: Arc<dyn HostCapabilityProvider>, config: EngineConfig) -> Result<Self> {
        let engine = RequestEngine::builder(&host)
            .event_bus(EventBus::new(config.event_buffer_size))
            .config(config)
            .build()?;
        Ok(Self { host, engine })
    }

    /// Wrap an engine built elsewhere for `host`.
    pub fn from_engine(host: Arc<dyn HostCapabilityProvider>, engine: RequestEngine) -> Self {
        Self { host, engine }
    }

    pub fn engine(&self) -> &RequestEngine {
        &self.engine
    }

    pub fn host(&self) -> &Arc<dyn HostCapabilityProvider> {
        &self.host
    }

    pub fn events(&self) -> &EventBus {
        self.engine.events()
    }

    /// `environment` uses the host codes: 1 local, 2 sandbox, 3 staging,
    /// 4 production.
    pub async fn init(
        &self,
        api_key: &str,
        dry_run: bool,
        environment: i32,
        show_errors_in_webview: bool,
    ) -> InitStatus {
        let status = InitStatus::from(
            self.engine
                .init_with_code(api_key, dry_run, environment, show_errors_in_webview)
                .await,
        );
        info!(status = status.status, "init finished");
        status
    }

    pub async fn get(&self, name: &str, params: Option<&str>) -> OpacityResponse {
        self.engine.get(name, params).await.into()
    }

    pub async fn get_with_cancellation(
        &self,
        name: &str,
        params: Option<&str>,
        cancel: CancellationToken,
    ) -> OpacityResponse {
        self.engine
            .get_with_cancellation(name, params, cancel)
            .await
            .into()
    }

    pub fn emit_webview_event(&self, event_json: &str) {
        self.engine.emit_webview_event(event_json);
    }

    pub fn get_api_version(&self) -> &'static str {
        self.engine.get_api_version()
    }

    /// `{"core": "<crate version>", "api": "<api version>"}`
    pub fn sdk_versions(&self) -> String {
        json!({ "core": CORE_VERSION, "api": API_VERSION }).to_string()
    }
}

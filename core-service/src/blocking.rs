//! Blocking façade for host threads that are not async.
//!
//! Owns a multi-thread Tokio runtime. Calls may come from any number of
//! threads at once; each blocks only its caller. Do not call from inside
//! another Tokio runtime.

use bridge_traits::HostCapabilityProvider;
use core_engine::CancellationToken;
use core_runtime::EngineConfig;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

use crate::facade::OpacityCore;
use crate::error::{CoreError, Result};
use crate::response::{InitStatus, OpacityResponse};

pub struct BlockingOpacityCore {
    runtime: Runtime,
    core: OpacityCore,
}

impl BlockingOpacityCore {
    pub fn new(host: Arc<dyn HostCapabilityProvider>, config: EngineConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("opacity-core")
            .enable_all()
            .build()
            .map_err(|e| CoreError::InitializationFailed(format!("runtime: {}", e)))?;
        let core = OpacityCore::new(host, config)?;
        Ok(Self { runtime, core })
    }

    pub fn core(&self) -> &OpacityCore {
        &self.core
    }

    pub fn init(
        &self,
        api_key: &str,
        dry_run: bool,
        environment: i32,
        show_errors_in_webview: bool,
    ) -> InitStatus {
        self.runtime.block_on(
            self.core
                .init(api_key, dry_run, environment, show_errors_in_webview),
        )
    }

    pub fn get(&self, name: &str, params: Option<&str>) -> OpacityResponse {
        self.runtime.block_on(self.core.get(name, params))
    }

    /// Cancel from another thread with `cancel.cancel()`.
    pub fn get_with_cancellation(
        &self,
        name: &str,
        params: Option<&str>,
        cancel: CancellationToken,
    ) -> OpacityResponse {
        self.runtime
            .block_on(self.core.get_with_cancellation(name, params, cancel))
    }

    /// Never blocks.
    pub fn emit_webview_event(&self, event_json: &str) {
        self.core.emit_webview_event(event_json);
    }

    pub fn get_api_version(&self) -> &'static str {
        self.core.get_api_version()
    }

    pub fn sdk_versions(&self) -> String {
        self.core.sdk_versions()
    }
}

//! Shared fixtures: a desktop host with a scripted browser, and helpers that
//! play the user's side of an interactive login.

#![allow(dead_code)]

use bridge_desktop::{BrowserNotice, DesktopDeviceInfo, DesktopHost, HeadlessBrowser};
use bridge_traits::{DeviceSnapshot, FlowId, HostCapabilityProvider};
use core_engine::RequestEngine;
use core_runtime::EngineConfig;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const API_KEY: &str = "sk_test_51Hx";

pub struct TestHost {
    pub host: Arc<dyn HostCapabilityProvider>,
    pub browser: Arc<HeadlessBrowser>,
}

impl TestHost {
    pub fn new() -> Self {
        let device = DesktopDeviceInfo::from_snapshot(DeviceSnapshot {
            os_version: "linux".to_string(),
            manufacturer: "Opacity".to_string(),
            model: "ci-runner".to_string(),
            locale: "en-US".to_string(),
            ..DeviceSnapshot::default()
        });
        let desktop = DesktopHost::ephemeral().with_device(device);
        let browser = desktop.browser();
        Self {
            host: Arc::new(desktop),
            browser,
        }
    }

    pub fn engine(&self, config: EngineConfig) -> RequestEngine {
        RequestEngine::builder(&self.host)
            .config(config)
            .build()
            .expect("valid engine config")
    }
}

/// Defaults with a short interactive timeout and no HTTP client.
pub fn offline_config() -> EngineConfig {
    EngineConfig {
        interactive_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    }
}

pub async fn dry_run_engine(host: &TestHost, config: EngineConfig) -> RequestEngine {
    let engine = host.engine(config);
    engine
        .init(API_KEY, true, core_engine::Environment::Sandbox, false)
        .await
        .expect("dry-run init");
    engine
}

/// Runs `react` for every browser presentation. Subscribes before returning,
/// so no presentation after this call is missed.
pub fn on_present<F>(host: &TestHost, engine: &RequestEngine, react: F) -> JoinHandle<()>
where
    F: Fn(&Presented) + Send + 'static,
{
    let mut notices = host.browser.subscribe();
    let browser = Arc::clone(&host.browser);
    let engine = engine.clone();

    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            if let BrowserNotice::Presented { flow, url } = notice {
                react(&Presented {
                    flow,
                    url,
                    browser: Arc::clone(&browser),
                    engine: engine.clone(),
                });
            }
        }
    })
}

/// One presentation, as seen by the scripted user.
pub struct Presented {
    pub flow: FlowId,
    pub url: String,
    pub browser: Arc<HeadlessBrowser>,
    pub engine: RequestEngine,
}

impl Presented {
    pub fn navigate(&self, id: u32, url: &str) {
        self.engine
            .emit_webview_event(&navigation(Some(self.flow), id, url, None));
    }

    pub fn navigate_with_cookies(&self, id: u32, url: &str, cookies: Value) {
        self.engine
            .emit_webview_event(&navigation(Some(self.flow), id, url, Some(cookies)));
    }

    pub fn close(&self) {
        self.engine.emit_webview_event(
            &json!({ "event": "close", "id": "close-1", "flow_id": self.flow.to_string() })
                .to_string(),
        );
    }
}

pub fn navigation(flow: Option<FlowId>, id: u32, url: &str, cookies: Option<Value>) -> String {
    let mut event = json!({
        "event": "navigation",
        "id": id.to_string(),
        "url": url,
        "visited_urls": [url],
    });
    if let Some(flow) = flow {
        event["flow_id"] = json!(flow.to_string());
    }
    if let Some(cookies) = cookies {
        event["cookies"] = cookies;
    }
    event.to_string()
}

/// Polls until `condition` holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

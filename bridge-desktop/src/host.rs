//! Composite desktop host.

use async_trait::async_trait;
use bridge_traits::{
    browser::{BrowserController, BrowserCookies, FlowId},
    device::{DeviceInfo, DeviceSnapshot},
    error::Result,
    storage::SecureStore,
};
use std::sync::Arc;

use crate::{DesktopDeviceInfo, HeadlessBrowser, MemorySecureStore};

/// A [`HostCapabilityProvider`](bridge_traits::HostCapabilityProvider) made of
/// desktop parts: a secure store, a headless browser and detected device facts.
pub struct DesktopHost {
    store: Arc<dyn SecureStore>,
    browser: Arc<HeadlessBrowser>,
    device: DesktopDeviceInfo,
}

impl DesktopHost {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self {
            store,
            browser: Arc::new(HeadlessBrowser::new()),
            device: DesktopDeviceInfo::detect(),
        }
    }

    /// Host with an in-memory store; nothing survives the process.
    pub fn ephemeral() -> Self {
        Self::new(Arc::new(MemorySecureStore::new()))
    }

    /// Host backed by the OS keychain.
    #[cfg(feature = "secure-store")]
    pub fn with_keyring(service_name: impl Into<String>) -> Self {
        Self::new(Arc::new(crate::KeyringSecureStore::with_service_name(
            service_name,
        )))
    }

    pub fn with_device(mut self, device: DesktopDeviceInfo) -> Self {
        self.device = device;
        self
    }

    /// Handle to the browser, for drivers that inject cookies or watch
    /// presentations.
    pub fn browser(&self) -> Arc<HeadlessBrowser> {
        Arc::clone(&self.browser)
    }
}

#[async_trait]
impl SecureStore for DesktopHost {
    async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        self.store.set_secret(key, value).await
    }

    async fn get_secret(&self, key: &str) -> Result<Option<String>> {
        self.store.get_secret(key).await
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        self.store.delete_secret(key).await
    }
}

#[async_trait]
impl BrowserController for DesktopHost {
    async fn prepare_browser(&self, flow: FlowId, url: &str) -> Result<()> {
        self.browser.prepare_browser(flow, url).await
    }

    async fn set_browser_header(&self, flow: FlowId, key: &str, value: &str) -> Result<()> {
        self.browser.set_browser_header(flow, key, value).await
    }

    async fn present_browser(&self, flow: FlowId, intercept_requests: bool) -> Result<()> {
        self.browser.present_browser(flow, intercept_requests).await
    }

    async fn close_browser(&self, flow: FlowId) -> Result<()> {
        self.browser.close_browser(flow).await
    }

    async fn change_browser_url(&self, flow: FlowId, url: &str) -> Result<()> {
        self.browser.change_browser_url(flow, url).await
    }

    async fn cookies_for_current_url(&self, flow: FlowId) -> Result<Option<BrowserCookies>> {
        self.browser.cookies_for_current_url(flow).await
    }

    async fn cookies_for_domain(
        &self,
        flow: FlowId,
        domain: &str,
    ) -> Result<Option<BrowserCookies>> {
        self.browser.cookies_for_domain(flow, domain).await
    }
}

impl DeviceInfo for DesktopHost {
    fn os_version(&self) -> String {
        self.device.os_version()
    }

    fn sdk_level(&self) -> u32 {
        self.device.sdk_level()
    }

    fn manufacturer(&self) -> String {
        self.device.manufacturer()
    }

    fn model(&self) -> String {
        self.device.model()
    }

    fn locale(&self) -> String {
        self.device.locale()
    }

    fn screen_width(&self) -> u32 {
        self.device.screen_width()
    }

    fn screen_height(&self) -> u32 {
        self.device.screen_height()
    }

    fn screen_density(&self) -> f32 {
        self.device.screen_density()
    }

    fn screen_dpi(&self) -> u32 {
        self.device.screen_dpi()
    }

    fn cpu(&self) -> String {
        self.device.cpu()
    }

    fn codename(&self) -> String {
        self.device.codename()
    }

    fn is_app_foregrounded(&self) -> bool {
        self.device.is_app_foregrounded()
    }

    fn ip_address(&self) -> String {
        self.device.ip_address()
    }

    fn snapshot(&self) -> DeviceSnapshot {
        self.device.snapshot()
    }
}

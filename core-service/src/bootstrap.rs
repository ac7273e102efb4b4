//! Desktop bootstrap.

use bridge_desktop::DesktopHost;
use bridge_traits::HostCapabilityProvider;
use core_runtime::EngineConfig;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::facade::OpacityCore;

/// Build an [`OpacityCore`] on a [`DesktopHost`] with default configuration
/// (reqwest HTTP client, headless browser).
///
/// With the `secure-store` feature sessions are kept in the OS keychain under
/// `service_name`; otherwise they live in memory for the process lifetime.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// let core = core_service::bootstrap_desktop("com.example.app")?;
/// let status = core.init("sk_live_123", false, 4, false).await;
/// # Ok(())
/// # }
/// ```
pub fn bootstrap_desktop(service_name: &str) -> Result<OpacityCore> {
    bootstrap_desktop_with(service_name, EngineConfig::builder().build()?)
}

pub fn bootstrap_desktop_with(service_name: &str, config: EngineConfig) -> Result<OpacityCore> {
    let host: Arc<dyn HostCapabilityProvider> = Arc::new(desktop_host(service_name));
    info!(service_name, "Bootstrapping desktop host");
    OpacityCore::new(host, config)
}

#[cfg(feature = "secure-store")]
fn desktop_host(service_name: &str) -> DesktopHost {
    DesktopHost::with_keyring(service_name)
}

#[cfg(not(feature = "secure-store"))]
fn desktop_host(_service_name: &str) -> DesktopHost {
    DesktopHost::ephemeral()
}

//! Desktop Device Introspection

use bridge_traits::device::{DeviceInfo, DeviceSnapshot};
use std::net::UdpSocket;

/// Device facts for a desktop process, detected once at construction.
///
/// Screen geometry is unknown to a headless process and stays zero unless
/// set with [`DesktopDeviceInfo::with_screen`].
#[derive(Debug, Clone)]
pub struct DesktopDeviceInfo {
    facts: DeviceSnapshot,
}

impl DesktopDeviceInfo {
    pub fn detect() -> Self {
        let facts = DeviceSnapshot {
            os_version: std::env::consts::OS.to_string(),
            cpu: std::env::consts::ARCH.to_string(),
            locale: detect_locale(),
            model: std::env::var("HOSTNAME").unwrap_or_default(),
            codename: std::env::consts::FAMILY.to_string(),
            foregrounded: true,
            ip_address: detect_ip_address().unwrap_or_default(),
            ..DeviceSnapshot::default()
        };
        Self { facts }
    }

    /// Fixed facts, for tests and scripted hosts.
    pub fn from_snapshot(facts: DeviceSnapshot) -> Self {
        Self { facts }
    }

    pub fn with_screen(mut self, width: u32, height: u32, density: f32, dpi: u32) -> Self {
        self.facts.screen.width = width;
        self.facts.screen.height = height;
        self.facts.screen.density = density;
        self.facts.screen.dpi = dpi;
        self
    }
}

impl Default for DesktopDeviceInfo {
    fn default() -> Self {
        Self::detect()
    }
}

/// `LANG=en_US.UTF-8` becomes `en-US`.
fn detect_locale() -> String {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty() && v != "C" && v != "POSIX")
        .map(|v| {
            v.split(['.', '@'])
                .next()
                .unwrap_or_default()
                .replace('_', "-")
        })
        .unwrap_or_default()
}

// Connecting a UDP socket only selects a route; no packet is sent.
fn detect_ip_address() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip().to_string())
}

impl DeviceInfo for DesktopDeviceInfo {
    fn os_version(&self) -> String {
        self.facts.os_version.clone()
    }

    fn sdk_level(&self) -> u32 {
        self.facts.sdk_level
    }

    fn manufacturer(&self) -> String {
        self.facts.manufacturer.clone()
    }

    fn model(&self) -> String {
        self.facts.model.clone()
    }

    fn locale(&self) -> String {
        self.facts.locale.clone()
    }

    fn screen_width(&self) -> u32 {
        self.facts.screen.width
    }

    fn screen_height(&self) -> u32 {
        self.facts.screen.height
    }

    fn screen_density(&self) -> f32 {
        self.facts.screen.density
    }

    fn screen_dpi(&self) -> u32 {
        self.facts.screen.dpi
    }

    fn cpu(&self) -> String {
        self.facts.cpu.clone()
    }

    fn codename(&self) -> String {
        self.facts.codename.clone()
    }

    fn is_app_foregrounded(&self) -> bool {
        self.facts.foregrounded
    }

    fn ip_address(&self) -> String {
        self.facts.ip_address.clone()
    }

    fn snapshot(&self) -> DeviceSnapshot {
        self.facts.clone()
    }
}

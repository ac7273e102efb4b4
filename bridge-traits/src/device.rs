//! Device and Environment Introspection
//!
//! Synchronous, side-effect-free reads of host facts. Every method has a
//! default (empty string / zero / `true`) so hosts only override what they
//! can actually answer; an unavailable value is never an error.

use serde::{Deserialize, Serialize};

/// Host device facts.
pub trait DeviceInfo: Send + Sync {
    fn os_version(&self) -> String {
        String::new()
    }

    /// Platform API level (Android SDK int, 0 elsewhere).
    fn sdk_level(&self) -> u32 {
        0
    }

    fn manufacturer(&self) -> String {
        String::new()
    }

    fn model(&self) -> String {
        String::new()
    }

    /// BCP-47 tag such as `en-US`.
    fn locale(&self) -> String {
        String::new()
    }

    fn screen_width(&self) -> u32 {
        0
    }

    fn screen_height(&self) -> u32 {
        0
    }

    fn screen_density(&self) -> f32 {
        0.0
    }

    fn screen_dpi(&self) -> u32 {
        0
    }

    fn cpu(&self) -> String {
        String::new()
    }

    fn codename(&self) -> String {
        String::new()
    }

    fn is_app_foregrounded(&self) -> bool {
        true
    }

    fn ip_address(&self) -> String {
        String::new()
    }

    /// Collect every fact into one serializable value.
    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            os_version: self.os_version(),
            sdk_level: self.sdk_level(),
            manufacturer: self.manufacturer(),
            model: self.model(),
            locale: self.locale(),
            screen: ScreenGeometry {
                width: self.screen_width(),
                height: self.screen_height(),
                density: self.screen_density(),
                dpi: self.screen_dpi(),
            },
            cpu: self.cpu(),
            codename: self.codename(),
            foregrounded: self.is_app_foregrounded(),
            ip_address: self.ip_address(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub density: f32,
    pub dpi: u32,
}

/// Serializable copy of [`DeviceInfo`] taken at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub os_version: String,
    pub sdk_level: u32,
    pub manufacturer: String,
    pub model: String,
    pub locale: String,
    pub screen: ScreenGeometry,
    pub cpu: String,
    pub codename: String,
    pub foregrounded: bool,
    pub ip_address: String,
}

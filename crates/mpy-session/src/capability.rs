//! Device capability snapshot (spec.md §3).

use std::collections::HashSet;
use std::time::SystemTime;

/// One bit of the device's reported feature set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Feature {
    Gpio,
    Adc,
    Pwm,
    I2c,
    Spi,
    Timer,
    Rtc,
    Threading,
    FileSystem,
    WiFi,
    Bluetooth,
    CryptoAccel,
    TouchSensor,
    Display,
    Audio,
}

impl Feature {
    /// Parse a feature flag name as reported by the probe fragment.
    pub fn parse(name: &str) -> Option<Feature> {
        match name {
            "GPIO" => Some(Feature::Gpio),
            "ADC" => Some(Feature::Adc),
            "PWM" => Some(Feature::Pwm),
            "I2C" => Some(Feature::I2c),
            "SPI" => Some(Feature::Spi),
            "Timer" => Some(Feature::Timer),
            "RTC" => Some(Feature::Rtc),
            "Threading" => Some(Feature::Threading),
            "FileSystem" => Some(Feature::FileSystem),
            "WiFi" => Some(Feature::WiFi),
            "Bluetooth" => Some(Feature::Bluetooth),
            "CryptoAccel" => Some(Feature::CryptoAccel),
            "TouchSensor" => Some(Feature::TouchSensor),
            "Display" => Some(Feature::Display),
            "Audio" => Some(Feature::Audio),
            _ => None,
        }
    }
}

/// Populated once per connection by the capability probe. Read-only to
/// callers after publication.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CapabilitySnapshot {
    pub platform: Option<String>,
    pub version: Option<String>,
    pub free_memory: Option<u64>,
    pub features: HashSet<Feature>,
    pub supports_raw_paste: bool,
    #[serde(skip, default = "SystemTime::now")]
    pub detected_at: SystemTime,
}

/// Raw JSON shape returned by the probe fragment (see `session::probe_capabilities`).
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ProbeResponse {
    pub platform: Option<String>,
    pub version: Option<String>,
    pub free_memory: Option<u64>,
    pub features: Vec<String>,
}

impl CapabilitySnapshot {
    pub(crate) fn from_probe(probe: ProbeResponse, supports_raw_paste: bool) -> CapabilitySnapshot {
        CapabilitySnapshot {
            platform: probe.platform,
            version: probe.version,
            free_memory: probe.free_memory,
            features: probe.features.iter().filter_map(|s| Feature::parse(s)).collect(),
            supports_raw_paste,
            detected_at: SystemTime::now(),
        }
    }
}

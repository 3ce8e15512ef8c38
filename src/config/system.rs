//! Instrument configuration - root configuration structure.

use std::path::PathBuf;

use heapless::{FnvIndexMap, String};
use serde::Deserialize;

use super::motor::{PortSelectorConfig, ScanMotorConfig};
use super::units::StepsPerCount;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MonochromatorConfig {
    /// The grating stage.
    pub scan_motor: ScanMotorConfig,

    /// Named port selectors.
    #[serde(default)]
    pub port_selectors: FnvIndexMap<String<32>, PortSelectorConfig, 4>,

    /// Where the stage position survives restarts.
    pub persistence: PersistenceConfig,

    /// Optional scan event log.
    #[serde(default)]
    pub scan_log: Option<ScanLogConfig>,
}

/// Position file settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the position file.
    pub path: PathBuf,

    /// Counter readout to step conversion.
    #[serde(default)]
    pub steps_per_count: StepsPerCount,
}

/// Scan log settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanLogConfig {
    /// Path of the log file.
    #[serde(default = "default_scan_log_path")]
    pub path: PathBuf,
}

fn default_scan_log_path() -> PathBuf {
    PathBuf::from("/var/log/monochromatord/motion.log")
}

impl MonochromatorConfig {
    /// Get a port selector configuration by name.
    pub fn port_selector(&self, name: &str) -> Option<&PortSelectorConfig> {
        self.port_selectors
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// List all port selector names.
    pub fn port_selector_names(&self) -> impl Iterator<Item = &str> {
        self.port_selectors.keys().map(|s| s.as_str())
    }
}

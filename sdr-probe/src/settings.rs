//! Probe settings

use std::path::PathBuf;

use sdr_session::SessionConfig;
use sdr_sim::VirtualDongleConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding the configured backend
pub const BACKEND_ENV: &str = "SDR_PROBE_BACKEND";

/// Which transport to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// System librtlsdr (real hardware)
    #[default]
    Librtlsdr,
    /// Virtual dongles from `virtual_dongles`
    Simulated,
}

impl Backend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "librtlsdr" | "rtlsdr" | "hardware" => Some(Self::Librtlsdr),
            "simulated" | "sim" => Some(Self::Simulated),
            _ => None,
        }
    }
}

/// Probe settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Transport backend
    pub backend: Backend,
    /// Device to open
    pub device_index: u32,
    /// Open with tuner AGC instead of a fixed gain
    pub auto_gain_control: bool,
    /// Serial numbers to leave alone
    pub skip_serials: Vec<String>,
    /// Session deadlines and initial settings
    pub session: SessionConfig,
    /// Dongles attached when `backend` is `simulated`
    pub virtual_dongles: Vec<VirtualDongleConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            device_index: 0,
            auto_gain_control: false,
            skip_serials: Vec::new(),
            session: SessionConfig::default(),
            virtual_dongles: vec![VirtualDongleConfig::default()],
        }
    }
}

impl Settings {
    /// Get the config directory for sdr-probe
    /// Uses $XDG_CONFIG_HOME/sdr-probe when absolute, else the platform config dir
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("sdr-probe"));
            }
        }

        dirs::config_dir().map(|p| p.join("sdr-probe"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, then apply environment overrides
    pub fn load() -> Self {
        let settings = Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .map(|s| Self::from_json(&s))
            .unwrap_or_default();
        settings.with_backend_override(std::env::var(BACKEND_ENV).ok().as_deref())
    }

    /// Parse settings JSON, falling back to defaults if it is malformed
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str(json).unwrap_or_else(|e| {
            warn!("Ignoring malformed settings file: {}", e);
            Self::default()
        })
    }

    /// Replace the backend with `value` if it names one
    pub fn with_backend_override(mut self, value: Option<&str>) -> Self {
        if let Some(value) = value {
            match Backend::parse(value) {
                Some(backend) => self.backend = backend,
                None => warn!(
                    "Unknown {} value {:?}; keeping {:?}",
                    BACKEND_ENV, value, self.backend
                ),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = Settings::from_json(r#"{"backend": "simulated", "device_index": 1}"#);
        assert_eq!(settings.backend, Backend::Simulated);
        assert_eq!(settings.device_index, 1);
        assert!(!settings.auto_gain_control);
        assert_eq!(settings.session, SessionConfig::default());
        assert_eq!(settings.virtual_dongles.len(), 1);
    }

    #[test]
    fn test_nested_session_config() {
        let settings =
            Settings::from_json(r#"{"session": {"open_timeout_ms": 100, "initial_gain_db": null}}"#);
        assert_eq!(settings.session.open_timeout_ms, 100);
        assert_eq!(settings.session.initial_gain_db, None);
        assert_eq!(settings.session.control_timeout_ms, 1000);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        assert_eq!(Settings::from_json("{not json"), Settings::default());
    }

    #[test]
    fn test_backend_override() {
        let settings = Settings::default().with_backend_override(Some("SIM"));
        assert_eq!(settings.backend, Backend::Simulated);

        let settings = settings.with_backend_override(Some("bogus"));
        assert_eq!(settings.backend, Backend::Simulated);

        let settings = settings.with_backend_override(None);
        assert_eq!(settings.backend, Backend::Simulated);

        let settings = settings.with_backend_override(Some("librtlsdr"));
        assert_eq!(settings.backend, Backend::Librtlsdr);
    }
}

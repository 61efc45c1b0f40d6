//! Tunables of the input core.
//!
//! [`InputConfig`] is a plain struct with sensible defaults. With the `config`
//! feature it can also be read from TOML, and [`profile::BindProfile`] stores
//! per-device bindings in the same format.

#[cfg(feature = "config")]
pub mod profile;

use std::time::Duration;

#[cfg(feature = "config")]
use crate::error::{InputError, Result};
#[cfg(feature = "config")]
use std::path::{Path, PathBuf};

/// What polling does when no device is left to read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum NoDevicePolicy {
    /// Log and terminate the process instead of blocking forever
    #[default]
    Exit,
    /// Return `InputError::NoDevices` to the caller
    Error,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct InputConfig {
    /// Device table capacity
    pub max_devices: usize,
    /// Longest device name kept, suffix included
    pub max_name_len: usize,
    /// Room kept free at the end of a name for a " [n]" duplicate suffix
    pub name_suffix_reserve: usize,
    /// First wait of `menu_wait`, giving the user time to release a button
    pub menu_initial_delay_ms: u64,
    /// Sleep between rounds of spin polling async-only devices
    pub async_poll_interval_ms: u64,
    pub no_device_policy: NoDevicePolicy,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_devices: 10,
            max_name_len: 255,
            name_suffix_reserve: 11,
            menu_initial_delay_ms: 450,
            async_poll_interval_ms: 10,
            no_device_policy: NoDevicePolicy::Exit,
        }
    }
}

impl InputConfig {
    pub fn menu_initial_delay(&self) -> Duration {
        Duration::from_millis(self.menu_initial_delay_ms)
    }

    pub fn async_poll_interval(&self) -> Duration {
        Duration::from_millis(self.async_poll_interval_ms)
    }

    /// Characters of a device name kept before any duplicate suffix.
    pub fn name_base_len(&self) -> usize {
        self.max_name_len.saturating_sub(self.name_suffix_reserve).max(1)
    }
}

#[cfg(feature = "config")]
impl InputConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| InputError::config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InputError::config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// `<user config dir>/padbind/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("padbind").join("config.toml"))
    }

    /// Load the default config file, falling back to defaults when it is absent.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_frontend_constants() {
        let config = InputConfig::default();
        assert_eq!(config.max_devices, 10);
        assert_eq!(config.menu_initial_delay(), Duration::from_millis(450));
        assert_eq!(config.async_poll_interval(), Duration::from_millis(10));
        assert_eq!(config.name_base_len(), 244);
        assert_eq!(config.no_device_policy, NoDevicePolicy::Exit);
    }

    #[test]
    fn name_base_len_never_reaches_zero() {
        let config = InputConfig {
            max_name_len: 4,
            name_suffix_reserve: 11,
            ..InputConfig::default()
        };
        assert_eq!(config.name_base_len(), 1);
    }

    #[cfg(feature = "config")]
    #[test]
    fn partial_toml_keeps_defaults() {
        let config = InputConfig::from_toml_str(
            "max_devices = 4\nno_device_policy = \"error\"\n",
        )
        .unwrap();
        assert_eq!(config.max_devices, 4);
        assert_eq!(config.no_device_policy, NoDevicePolicy::Error);
        assert_eq!(config.menu_initial_delay_ms, 450);
    }

    #[cfg(feature = "config")]
    #[test]
    fn load_reads_file_and_reports_bad_toml() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "async_poll_interval_ms = 2").unwrap();
        let config = InputConfig::load(file.path()).unwrap();
        assert_eq!(config.async_poll_interval(), Duration::from_millis(2));

        let err = InputConfig::from_toml_str("max_devices = \"many\"").unwrap_err();
        assert!(matches!(err, InputError::Config { .. }));
    }
}

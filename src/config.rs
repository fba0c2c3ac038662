//! Driver configuration. Every field has a default, so an empty JSON object
//! is a complete configuration. `SNESBRIDGE_*` environment variables
//! override the parsed values.
use std::{error::Error, fmt, fs, io, path::Path, sync::Arc, time::Duration};

use serde::Deserialize;
use tracing::info;

use crate::{
    device::KeepAliveSettings,
    driver::DriverRegistry,
    drivers::{
        emunw::{self, EmuNwDriver, EmuNwSettings},
        luabridge::{self, LuaBridgeDriver, LuaBridgeSettings},
        mock::MockDriver,
    },
};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
    /// The Lua bridge could not bind its listen address.
    Listen { address: String, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read configuration: {err}"),
            ConfigError::Parse(err) => write!(f, "invalid configuration: {err}"),
            ConfigError::Listen { address, source } => {
                write!(f, "cannot listen on {address}: {source}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Listen { source, .. } => Some(source),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        ConfigError::Parse(value)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub emunw: EmuNwConfig,
    pub luabridge: LuaBridgeConfig,
    pub mock: MockConfig,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct EmuNwConfig {
    pub enabled: bool,
    pub hosts: Vec<String>,
    pub probe_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    pub keepalive_idle_ms: u64,
}

impl Default for EmuNwConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hosts: emunw::default_hosts(),
            probe_timeout_ms: 250,
            request_timeout_ms: 5000,
            keepalive_interval_ms: 2000,
            keepalive_idle_ms: 5000,
        }
    }
}

impl EmuNwConfig {
    pub fn settings(&self) -> EmuNwSettings {
        EmuNwSettings {
            hosts: self.hosts.clone(),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            keepalive: keepalive(
                self.keepalive_interval_ms,
                self.keepalive_idle_ms,
                self.request_timeout_ms,
            ),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct LuaBridgeConfig {
    pub enabled: bool,
    pub listen: String,
    pub request_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    pub keepalive_idle_ms: u64,
}

impl Default for LuaBridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: luabridge::DEFAULT_LISTEN.to_string(),
            request_timeout_ms: 5000,
            keepalive_interval_ms: 2000,
            keepalive_idle_ms: 5000,
        }
    }
}

impl LuaBridgeConfig {
    pub fn settings(&self) -> LuaBridgeSettings {
        LuaBridgeSettings {
            listen: self.listen.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            keepalive: keepalive(
                self.keepalive_interval_ms,
                self.keepalive_idle_ms,
                self.request_timeout_ms,
            ),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct MockConfig {
    pub enabled: bool,
}

fn keepalive(interval_ms: u64, idle_ms: u64, timeout_ms: u64) -> KeepAliveSettings {
    KeepAliveSettings {
        interval: Duration::from_millis(interval_ms.max(1)),
        idle: Duration::from_millis(idle_ms),
        timeout: Duration::from_millis(timeout_ms),
    }
}

fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Applies `SNESBRIDGE_*` overrides from `vars`. Unrelated variables are
    /// ignored.
    pub fn apply_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                "SNESBRIDGE_EMUNW_DISABLE" => self.emunw.enabled = !env_flag(value),
                "SNESBRIDGE_EMUNW_HOSTS" => {
                    self.emunw.hosts = value
                        .split(',')
                        .map(str::trim)
                        .filter(|host| !host.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "SNESBRIDGE_LUABRIDGE_DISABLE" => self.luabridge.enabled = !env_flag(value),
                "SNESBRIDGE_LUABRIDGE_LISTEN" => self.luabridge.listen = value.trim().to_string(),
                "SNESBRIDGE_MOCK_ENABLE" => self.mock.enabled = env_flag(value),
                _ => {}
            }
        }
    }

    pub fn apply_process_env(&mut self) {
        self.apply_env(std::env::vars());
    }

    /// Builds a registry holding every enabled driver. The Lua bridge starts
    /// listening before this returns.
    pub async fn build_registry(&self) -> ConfigResult<DriverRegistry> {
        let mut registry = DriverRegistry::new();
        if self.emunw.enabled {
            registry.register(Arc::new(EmuNwDriver::new(self.emunw.settings())));
        }
        if self.luabridge.enabled {
            let driver = LuaBridgeDriver::new(self.luabridge.settings());
            driver.listen().await.map_err(|source| ConfigError::Listen {
                address: self.luabridge.listen.clone(),
                source,
            })?;
            registry.register(Arc::new(driver));
        }
        if self.mock.enabled {
            registry.register(Arc::new(MockDriver::new()));
        }
        info!(drivers = ?registry.kinds().collect::<Vec<_>>(), "driver registry ready");
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.emunw.hosts.len(), 10, "ten conventional bridge ports");
        assert_eq!(config.emunw.hosts[0], "127.0.0.1:48879");
        assert!(!config.mock.enabled, "mock is opt-in");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let json = r#"{"emunw": {"probe_timeout_ms": 50}, "mock": {"enabled": true}}"#;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.emunw.probe_timeout_ms, 50);
        assert!(config.emunw.enabled, "unspecified fields keep their default");
        assert!(config.mock.enabled);
        assert_eq!(config.emunw.settings().probe_timeout, Duration::from_millis(50));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config.apply_env([
            ("SNESBRIDGE_EMUNW_HOSTS", "10.0.0.5:48879, 10.0.0.6:48879,"),
            ("SNESBRIDGE_LUABRIDGE_DISABLE", "true"),
            ("SNESBRIDGE_MOCK_ENABLE", "1"),
            ("PATH", "/usr/bin"),
        ]);
        assert_eq!(config.emunw.hosts, vec!["10.0.0.5:48879", "10.0.0.6:48879"]);
        assert!(!config.luabridge.enabled);
        assert!(config.mock.enabled);
        assert!(config.emunw.enabled, "untouched section unchanged");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            Config::from_json_str("{\"emunw\": 3}"),
            Err(ConfigError::Parse(_))
        ));
    }
}

//! Configuration loading — TOML file with environment variable overrides.
//!
//! Reads `homewire.toml` from the working directory unless another path is
//! given. Every field has a default so the file is optional. Environment
//! variables take precedence over file values.

use std::collections::HashSet;
use std::path::Path;

use homewire_adapter_mqtt::MqttConfig;
use homewire_domain::id::{DeviceId, DeviceIdentity, DeviceKind};
use homewire_domain::state::DeviceState;
use homewire_domain::topic::{DEFAULT_BASE, Topics};
use serde::Deserialize;

pub const DEFAULT_PATH: &str = "homewire.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// MQTT broker connection.
    pub broker: MqttConfig,
    /// Topic namespace settings.
    pub protocol: ProtocolConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Simulated devices. Empty means the built-in pair.
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Prefix shared by every command and status topic.
    pub base_topic: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One simulated device.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub kind: DeviceKind,
    /// Initial brightness or speed; the device starts off when absent.
    #[serde(default)]
    pub level: Option<u8>,
}

impl DeviceConfig {
    fn new(id: &str, kind: DeviceKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            level: None,
        }
    }

    /// Validated id and starting state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for an invalid id or an
    /// out-of-range level.
    pub fn build(&self) -> Result<(DeviceId, DeviceState), ConfigError> {
        let id = DeviceId::new(self.id.as_str()).map_err(|err| {
            ConfigError::Validation(format!("device id `{}`: {err}", self.id))
        })?;
        let state = match self.level {
            None => DeviceState::initial(self.kind),
            Some(level) => DeviceState::with_level(self.kind, level).map_err(|err| {
                ConfigError::Validation(format!("device `{}` level {level}: {err}", self.id))
            })?,
        };
        Ok((id, state))
    }
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or malformed, or
    /// if the merged configuration fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("HOMEWIRE_BROKER_HOST") {
            self.broker.broker_host = val;
        }
        if let Some(port) = lookup("HOMEWIRE_BROKER_PORT").and_then(|val| val.parse().ok()) {
            self.broker.broker_port = port;
        }
        if let Some(val) = lookup("HOMEWIRE_BASE_TOPIC") {
            self.protocol.base_topic = val;
        }
        if let Some(val) = lookup("HOMEWIRE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.broker_port == 0 {
            return Err(ConfigError::Validation(
                "broker port must be non-zero".to_string(),
            ));
        }
        let base = self.protocol.base_topic.trim_end_matches('/');
        if base.is_empty() {
            return Err(ConfigError::Validation(
                "base topic must not be empty".to_string(),
            ));
        }
        if base.contains(['+', '#']) {
            return Err(ConfigError::Validation(format!(
                "base topic `{base}` must not contain wildcards"
            )));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            let (id, _) = device.build()?;
            if !seen.insert(DeviceIdentity::new(device.kind, id)) {
                return Err(ConfigError::Validation(format!(
                    "device {}/{} configured twice",
                    device.kind, device.id
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn topics(&self) -> Topics {
        Topics::new(self.protocol.base_topic.as_str())
    }

    /// Configured devices, or the built-in living room light and bedroom fan
    /// when none are listed.
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceConfig> {
        if self.devices.is_empty() {
            default_devices()
        } else {
            self.devices.clone()
        }
    }
}

fn default_devices() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig::new("living_room_light", DeviceKind::Light),
        DeviceConfig::new("bedroom_fan", DeviceKind::Fan),
    ]
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            base_topic: DEFAULT_BASE.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homewired=info,homewire=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

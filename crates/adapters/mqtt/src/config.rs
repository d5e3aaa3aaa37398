//! MQTT connection configuration.

use std::time::Duration;

use serde::Deserialize;

/// Broker connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// How long the initial handshake may take before startup fails.
    pub connect_timeout_secs: u16,
    /// Pause between reconnect attempts after the connection drops.
    pub reconnect_delay_secs: u16,
    /// Prefix for generated client identifiers.
    pub client_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
            reconnect_delay_secs: 1,
            client_prefix: "homewire".to_string(),
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.reconnect_delay_secs))
    }
}

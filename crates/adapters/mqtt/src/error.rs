//! MQTT adapter error types.

use homewire_domain::error::TransportError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client refused a request (event loop gone or queue closed).
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// The network connection to the broker failed.
    #[error("MQTT connection error")]
    Connection(#[source] rumqttc::ConnectionError),

    /// The broker answered the handshake with a refusal.
    #[error("MQTT broker refused connection: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    /// No handshake within the configured timeout.
    #[error("MQTT broker did not answer within {secs}s")]
    Timeout { secs: u16 },
}

impl MqttError {
    /// Convert into a [`TransportError`] for propagation across the port
    /// boundary.
    #[must_use]
    pub fn into_transport(self) -> TransportError {
        match self {
            Self::Client(rumqttc::ClientError::Request(_) | rumqttc::ClientError::TryRequest(_)) => {
                TransportError::Closed
            }
            other => TransportError::Client(Box::new(other)),
        }
    }
}

impl From<MqttError> for TransportError {
    fn from(err: MqttError) -> Self {
        err.into_transport()
    }
}

impl From<rumqttc::ClientError> for MqttError {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Client(err)
    }
}

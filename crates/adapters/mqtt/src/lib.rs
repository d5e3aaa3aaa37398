//! MQTT adapter for homewire.
//!
//! Implements the transport port on top of [`rumqttc`]. Each endpoint gets
//! its own client connection; a background task drives the rumqttc event
//! loop and turns its notifications into [`TransportEvent`]s.
//!
//! | Port method   | MQTT                                   |
//! |---------------|----------------------------------------|
//! | `subscribe`   | SUBSCRIBE, QoS 1                       |
//! | `publish`     | PUBLISH, QoS 1, retain flag as given   |
//! | `disconnect`  | DISCONNECT, then the driver task ends  |
//!
//! rumqttc reconnects on the next poll after a failure; the driver waits
//! [`MqttConfig::reconnect_delay`] between attempts. Sessions are clean, so
//! subscriptions must be re-issued on every `Connected`.
//!
//! Events are pushed into an unbounded stream so the driver never waits on a
//! busy consumer. [`MqttTransport::shutdown`] aborts a driver that has not
//! finished flushing within its grace period.
//!
//! [`TransportEvent`]: homewire_app::ports::TransportEvent

pub mod config;
pub mod error;
mod transport;

pub use config::MqttConfig;
pub use error::MqttError;
pub use transport::MqttTransport;

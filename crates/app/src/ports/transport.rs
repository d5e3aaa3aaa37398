//! Transport port — the publish/subscribe substrate components talk through.
//!
//! A connection is a pair: a [`Transport`] handle used to send, and an
//! [`EventStream`] carrying everything the substrate delivers (connection
//! changes and inbound messages). Adapters create both; components consume
//! the events one at a time, so at most one state mutation per component is
//! ever in flight.
//!
//! The stream is unbounded. A component awaiting a publish is not reading
//! its stream, and the substrate must keep servicing that publish meanwhile;
//! a bounded stream would let a burst of inbound messages stall both sides.
//!
//! Delivery is always at-least-once. Reconnection is the substrate's
//! business: after a loss it emits [`TransportEvent::Disconnected`] and,
//! once back, a fresh [`TransportEvent::Connected`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use homewire_domain::error::TransportError;

/// Receiving half of a connection.
pub type EventStream = mpsc::UnboundedReceiver<TransportEvent>;

/// Substrate side of an [`EventStream`].
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Something the substrate delivered on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed (initially or after a reconnect).
    Connected,
    /// Connection lost.
    Disconnected,
    /// A message arrived on a subscribed topic.
    Message(InboundMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Delivered from the substrate's retained store rather than live.
    pub retained: bool,
}

impl InboundMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retained: false,
        }
    }

    /// Payload rendered for logs.
    #[must_use]
    pub fn payload_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Ask the substrate to keep this as the topic's last known value.
    pub retain: bool,
}

impl OutboundMessage {
    /// A message the substrate stores and hands to future subscribers.
    #[must_use]
    pub fn retained(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }

    /// A message delivered to current subscribers only.
    #[must_use]
    pub fn transient(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }
}

/// Connection state as seen by a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
}

/// Sending half of a substrate connection.
///
/// Every call returns once the substrate has accepted the request; none of
/// them wait for delivery.
pub trait Transport: Send + Sync {
    /// Subscribe to a topic filter (`+` / `#` wildcards allowed).
    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish one message with at-least-once delivery.
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection. The event stream ends afterwards.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).subscribe(filter)
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).publish(message)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        (**self).disconnect()
    }
}

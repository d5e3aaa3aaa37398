//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the protocol core and the messaging
//! substrate. They are defined here (in `app`) so that both the components
//! and the adapters can depend on them without creating circular
//! dependencies.

pub mod transport;

pub use transport::{
    EventSink, EventStream, InboundMessage, LinkState, OutboundMessage, Transport, TransportEvent,
};

//! # homewire-adapter-memory
//!
//! In-process messaging substrate implementing the
//! [`Transport`](homewire_app::ports::Transport) port without a network.
//!
//! ## Behaviour
//!
//! | Feature | Semantics |
//! |---------|-----------|
//! | Filters | `+` matches one level, trailing `#` matches the rest |
//! | Retained | last retained payload per topic, handed to new subscribers immediately; empty payload clears it |
//! | Delivery | each matching client receives a message once, in publish order; never dropped while the client is connected |
//! | Sessions | clean: subscriptions die with the connection |
//!
//! [`MemoryBroker::interrupt`] simulates a connection loss followed by a
//! reconnect, which is how tests exercise the components' re-subscribe path.
//!
//! ## Dependency rule
//!
//! Depends on `homewire-app` (port traits) and `homewire-domain` only.

mod broker;

pub use broker::{MemoryBroker, MemoryClient};

//! # homewire-app
//!
//! Application layer — the protocol components and the **transport port**.
//!
//! ## Responsibilities
//! - Define the [`Transport`](ports::Transport) port that messaging adapters
//!   implement, plus the [`TransportEvent`](ports::TransportEvent) stream
//!   they feed
//! - [`DeviceAgent`](agent::DeviceAgent) — owns one device's state, applies
//!   commands, republishes retained status
//! - [`StatusAggregator`](aggregator::StatusAggregator) — read-only cache of
//!   the latest status per device
//! - [`CommandDispatcher`](dispatcher::CommandDispatcher) — fire-and-forget
//!   command publishing
//! - [`Controller`](controller::Controller) — dispatcher and aggregator
//!   sharing one connection
//!
//! ## Concurrency
//! Every component is driven by the event stream of its own connection.
//! An agent's state is only touched from its own loop, so it needs no lock.
//! The aggregator cache is the one structure read concurrently (by display
//! code) and sits behind a lock.
//!
//! ## Dependency rule
//! Depends on `homewire-domain` only (plus `tokio::sync` for channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod agent;
pub mod aggregator;
pub mod controller;
pub mod dispatcher;
pub mod ports;

#[cfg(test)]
mod test_support;

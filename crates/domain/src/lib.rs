//! # homewire-domain
//!
//! Pure domain model for the homewire device protocol.
//!
//! ## Responsibilities
//! - Foundational types: device identities, error taxonomy, timestamps
//! - **Topic addressing**: map `(type, id)` to command/status topics and back
//! - **Device state model**: per-type state shapes and the pure transition
//!   function that keeps their invariants
//! - **Wire messages**: the `Command` and `StatusMessage` JSON shapes
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! The messaging substrate is expressed as a trait in the `app` crate (port).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod state;
pub mod status;
pub mod topic;

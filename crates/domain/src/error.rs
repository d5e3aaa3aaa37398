//! Common error types used across the workspace.
//!
//! Every error here is handled at the component boundary that detects it:
//! logged with the offending topic/payload, then the triggering message is
//! dropped. [`HomewireError`] is the umbrella type components return so the
//! caller can decide how loudly to log.

use serde::de::{self, DeserializeOwned};

use crate::id::DeviceKind;

/// Top-level error for the homewire protocol core.
#[derive(Debug, thiserror::Error)]
pub enum HomewireError {
    #[error("malformed topic")]
    MalformedTopic(#[from] MalformedTopicError),

    #[error("undecodable payload")]
    Decode(#[from] DecodeError),

    #[error("command rejected")]
    Command(#[from] CommandError),

    #[error("transport failure")]
    Transport(#[from] TransportError),

    #[error("validation error")]
    Validation(#[from] ValidationError),
}

/// A topic that does not follow the `<base>/<type>/<id>/<suffix>` layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedTopicError {
    #[error("topic {topic:?} is outside base namespace {base:?}")]
    OutsideBase { topic: String, base: String },

    #[error("topic {topic:?} has {found} segments below the base, expected 3")]
    SegmentCount { topic: String, found: usize },

    #[error("topic {topic:?} does not end in {expected:?}")]
    UnexpectedSuffix {
        topic: String,
        expected: &'static str,
    },

    #[error("topic {topic:?} names unknown device type {kind:?}")]
    UnknownKind { topic: String, kind: String },

    #[error("topic {topic:?} carries an invalid device id")]
    InvalidId {
        topic: String,
        #[source]
        source: ValidationError,
    },
}

/// A payload that is not valid JSON, or not the expected object shape.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode payload")]
pub struct DecodeError(#[from] pub serde_json::Error);

impl DecodeError {
    /// Decode `payload` as `T`, accepting only a top-level JSON object.
    ///
    /// Derived struct impls would otherwise also take the sequence form
    /// (`["set_state","on"]`).
    pub(crate) fn decode_object<T: DeserializeOwned>(payload: &[u8]) -> Result<T, Self> {
        match serde_json::from_slice(payload)? {
            value @ serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
            _ => Err(Self(de::Error::custom("payload must be a JSON object"))),
        }
    }
}

/// Reasons the transition function refuses a command.
///
/// In both cases the device state is left untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("{kind} devices do not support action {action:?}")]
    UnsupportedAction { kind: DeviceKind, action: String },

    #[error("invalid value {value} for action {action:?}")]
    InvalidValue {
        action: &'static str,
        value: serde_json::Value,
    },
}

/// Failure surfaced by the messaging substrate.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is down; nothing was sent.
    #[error("transport not connected")]
    NotConnected,

    /// The substrate's request queue or event loop is gone.
    #[error("transport closed")]
    Closed,

    /// Adapter-specific client failure.
    #[error("transport client error")]
    Client(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations on identity values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device id must not be empty")]
    EmptyId,

    #[error("device id {id:?} contains reserved character {character:?}")]
    ReservedCharacter { id: String, character: char },

    #[error("unknown device type {0:?}")]
    UnknownKind(String),
}

//! Status message — the retained, authoritative snapshot a device publishes.
//!
//! Wire shape: the state fields, the `type` tag, the device `id` and
//! `last_updated` as fractional Unix seconds:
//!
//! ```json
//! {"type":"light","power":"on","brightness":80,"id":"living_room_light","last_updated":1700000000.5}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::id::{DeviceId, DeviceIdentity, DeviceKind};
use crate::state::DeviceState;
use crate::time::{Timestamp, now, unix_seconds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    #[serde(flatten)]
    pub state: DeviceState,
    pub id: DeviceId,
    #[serde(with = "unix_seconds")]
    pub last_updated: Timestamp,
}

impl StatusMessage {
    /// Snapshot `state` for device `id`, stamped with the current time.
    #[must_use]
    pub fn new(id: DeviceId, state: DeviceState) -> Self {
        Self::at(id, state, now())
    }

    #[must_use]
    pub fn at(id: DeviceId, state: DeviceState, last_updated: Timestamp) -> Self {
        Self {
            state,
            id,
            last_updated,
        }
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.state.kind()
    }

    /// The identity the payload claims to describe.
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.kind(), self.id.clone())
    }

    /// Decode a wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the payload is not JSON, not an object,
    /// names an unknown type, or carries a state breaking its invariants.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::decode_object(payload)
    }

    /// Encode as a JSON payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        // Every field has an infallible Serialize impl.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

//! Command — the untyped `{action, value}` request sent to a device.
//!
//! The schema depends on the device type:
//!
//! | Type | Action | Value |
//! |------|--------|-------|
//! | light | `set_state` | `"on"` / `"off"` or a boolean |
//! | light | `set_brightness` | integer `0..=100` |
//! | fan | `set_speed` | integer `0..=5` |
//!
//! Nothing is validated here; the receiving device's transition function is
//! the only judge of what it accepts.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

pub const SET_STATE: &str = "set_state";
pub const SET_BRIGHTNESS: &str = "set_brightness";
pub const SET_SPEED: &str = "set_speed";

/// A request to change a device's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Command {
    #[must_use]
    pub fn new(action: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            action: action.into(),
            value: value.into(),
        }
    }

    /// `{"action": "set_state", "value": "on"|"off"}`
    #[must_use]
    pub fn set_state(on: bool) -> Self {
        Self::new(SET_STATE, if on { "on" } else { "off" })
    }

    #[must_use]
    pub fn set_brightness(brightness: u8) -> Self {
        Self::new(SET_BRIGHTNESS, brightness)
    }

    #[must_use]
    pub fn set_speed(speed: u8) -> Self {
        Self::new(SET_SPEED, speed)
    }

    /// Decode a wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the payload is not a JSON object with a
    /// string `action`.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::decode_object(payload)
    }

    /// Encode as a JSON payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        // A struct of a String and a Value cannot fail to serialize.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Interpret `value` as an integer level within `0..=max`.
    ///
    /// Accepts JSON integers and integral floats (`3.0`).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn level(&self, max: u8) -> Option<u8> {
        let level = match &self.value {
            serde_json::Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(max))
                    .map(|f| f as u64)
            })?,
            _ => return None,
        };
        u8::try_from(level).ok().filter(|l| *l <= max)
    }
}

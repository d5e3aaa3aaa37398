//! Device state model — per-type state shapes and the transition function.
//!
//! [`DeviceState::apply`] is the only writer: every accepted command produces
//! a fresh state whose dependent `power` field is re-derived from the level
//! (`brightness` / `speed`), so the per-type invariants hold after any
//! sequence of accepted commands.

mod fan;
mod light;

pub use fan::{FanCommand, FanPower, FanState, MAX_SPEED};
pub use light::{DEFAULT_ON_BRIGHTNESS, LightCommand, LightPower, LightState, MAX_BRIGHTNESS};

use serde::{Deserialize, Serialize};

use crate::command::{Command, SET_BRIGHTNESS, SET_SPEED};
use crate::error::CommandError;
use crate::id::DeviceKind;

/// State of one device, tagged by its type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceState {
    Light(LightState),
    Fan(FanState),
}

impl DeviceState {
    /// The all-off state for a device type.
    #[must_use]
    pub fn initial(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Light => Self::Light(LightState::default()),
            DeviceKind::Fan => Self::Fan(FanState::default()),
        }
    }

    /// Build a starting state by driving [`initial`](Self::initial) through
    /// the type's level command (`set_brightness` / `set_speed`).
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidValue`] when `level` is out of range
    /// for the type.
    pub fn with_level(kind: DeviceKind, level: u8) -> Result<Self, CommandError> {
        let command = match kind {
            DeviceKind::Light => Command::new(SET_BRIGHTNESS, level),
            DeviceKind::Fan => Command::new(SET_SPEED, level),
        };
        Self::initial(kind).apply(&command)
    }

    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Light(_) => DeviceKind::Light,
            Self::Fan(_) => DeviceKind::Fan,
        }
    }

    /// Compute the state that results from `command`.
    ///
    /// Pure and deterministic. A command that reproduces the current state is
    /// still accepted; callers republish it like any other change.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnsupportedAction`] for an action the type
    /// does not know and [`CommandError::InvalidValue`] for a value of the
    /// wrong type or out of range. `self` is never modified.
    pub fn apply(&self, command: &Command) -> Result<Self, CommandError> {
        match self {
            Self::Light(state) => state.apply(command).map(Self::Light),
            Self::Fan(state) => state.apply(command).map(Self::Fan),
        }
    }
}

impl From<LightState> for DeviceState {
    fn from(state: LightState) -> Self {
        Self::Light(state)
    }
}

impl From<FanState> for DeviceState {
    fn from(state: FanState) -> Self {
        Self::Fan(state)
    }
}

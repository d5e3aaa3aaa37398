//! Fan — `set_speed`, with `power == running ⇔ speed > 0`.

use serde::{Deserialize, Serialize};

use crate::command::{Command, SET_SPEED};
use crate::error::CommandError;
use crate::id::DeviceKind;

pub const MAX_SPEED: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanPower {
    #[default]
    Off,
    Running,
}

/// Multi-speed fan state. `power` is derived from `speed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawFanState")]
pub struct FanState {
    power: FanPower,
    speed: u8,
}

/// Typed form of the commands a fan accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCommand {
    SetSpeed(u8),
}

impl TryFrom<&Command> for FanCommand {
    type Error = CommandError;

    fn try_from(command: &Command) -> Result<Self, Self::Error> {
        match command.action.as_str() {
            SET_SPEED => command
                .level(MAX_SPEED)
                .map(Self::SetSpeed)
                .ok_or_else(|| CommandError::InvalidValue {
                    action: SET_SPEED,
                    value: command.value.clone(),
                }),
            other => Err(CommandError::UnsupportedAction {
                kind: DeviceKind::Fan,
                action: other.to_string(),
            }),
        }
    }
}

impl FanState {
    #[must_use]
    pub fn power(&self) -> FanPower {
        self.power
    }

    #[must_use]
    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub(crate) fn apply(self, command: &Command) -> Result<Self, CommandError> {
        let FanCommand::SetSpeed(speed) = FanCommand::try_from(command)?;
        Ok(Self::from_speed(speed))
    }

    fn from_speed(speed: u8) -> Self {
        let power = if speed > 0 {
            FanPower::Running
        } else {
            FanPower::Off
        };
        Self { power, speed }
    }
}

#[derive(Deserialize)]
struct RawFanState {
    #[serde(alias = "state")]
    power: FanPower,
    speed: u8,
}

impl TryFrom<RawFanState> for FanState {
    type Error = &'static str;

    fn try_from(raw: RawFanState) -> Result<Self, Self::Error> {
        if raw.speed > MAX_SPEED {
            return Err("speed must be within 0..=5");
        }
        let state = Self::from_speed(raw.speed);
        if state.power != raw.power {
            return Err("fan power must be running exactly when speed is above zero");
        }
        Ok(state)
    }
}

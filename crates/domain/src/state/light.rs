//! Light — `set_state` and `set_brightness`, with `power == on ⇔ brightness > 0`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{Command, SET_BRIGHTNESS, SET_STATE};
use crate::error::CommandError;
use crate::id::DeviceKind;

pub const MAX_BRIGHTNESS: u8 = 100;

/// Brightness a light comes back at when switched on from zero.
pub const DEFAULT_ON_BRIGHTNESS: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightPower {
    On,
    #[default]
    Off,
}

/// Dimmable light state. `power` is derived from `brightness`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawLightState")]
pub struct LightState {
    power: LightPower,
    brightness: u8,
}

/// Typed form of the commands a light accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    SetState(LightPower),
    SetBrightness(u8),
}

impl TryFrom<&Command> for LightCommand {
    type Error = CommandError;

    fn try_from(command: &Command) -> Result<Self, Self::Error> {
        match command.action.as_str() {
            SET_STATE => match &command.value {
                Value::String(s) if s == "on" => Ok(Self::SetState(LightPower::On)),
                Value::String(s) if s == "off" => Ok(Self::SetState(LightPower::Off)),
                Value::Bool(on) => Ok(Self::SetState(if *on {
                    LightPower::On
                } else {
                    LightPower::Off
                })),
                _ => Err(CommandError::InvalidValue {
                    action: SET_STATE,
                    value: command.value.clone(),
                }),
            },
            SET_BRIGHTNESS => command
                .level(MAX_BRIGHTNESS)
                .map(Self::SetBrightness)
                .ok_or_else(|| CommandError::InvalidValue {
                    action: SET_BRIGHTNESS,
                    value: command.value.clone(),
                }),
            other => Err(CommandError::UnsupportedAction {
                kind: DeviceKind::Light,
                action: other.to_string(),
            }),
        }
    }
}

impl LightState {
    #[must_use]
    pub fn power(&self) -> LightPower {
        self.power
    }

    #[must_use]
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub(crate) fn apply(self, command: &Command) -> Result<Self, CommandError> {
        let brightness = match LightCommand::try_from(command)? {
            LightCommand::SetState(LightPower::On) if self.brightness == 0 => {
                DEFAULT_ON_BRIGHTNESS
            }
            LightCommand::SetState(LightPower::On) => self.brightness,
            LightCommand::SetState(LightPower::Off) => 0,
            LightCommand::SetBrightness(brightness) => brightness,
        };
        Ok(Self::from_brightness(brightness))
    }

    fn from_brightness(brightness: u8) -> Self {
        let power = if brightness > 0 {
            LightPower::On
        } else {
            LightPower::Off
        };
        Self { power, brightness }
    }
}

/// Unchecked wire shape; status payloads that break the invariant are
/// refused at decode time.
#[derive(Deserialize)]
struct RawLightState {
    #[serde(alias = "state")]
    power: LightPower,
    brightness: u8,
}

impl TryFrom<RawLightState> for LightState {
    type Error = &'static str;

    fn try_from(raw: RawLightState) -> Result<Self, Self::Error> {
        if raw.brightness > MAX_BRIGHTNESS {
            return Err("brightness must be within 0..=100");
        }
        let state = Self::from_brightness(raw.brightness);
        if state.power != raw.power {
            return Err("light power must be on exactly when brightness is above zero");
        }
        Ok(state)
    }
}

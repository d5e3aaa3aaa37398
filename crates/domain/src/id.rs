//! Device identity — the `(type, id)` pair every topic is addressed by.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Characters that would break topic addressing if they appeared in an id:
/// the level separator and the two subscription wildcards.
const RESERVED: [char; 3] = ['/', '+', '#'];

/// The closed set of device types the protocol knows about.
///
/// Adding a type means adding a variant here and a matching
/// [`DeviceState`](crate::state::DeviceState) variant; the compiler then
/// points at every dispatch site that must learn about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Light,
    Fan,
}

impl DeviceKind {
    /// All known kinds, in display order.
    pub const ALL: [Self; 2] = [Self::Light, Self::Fan];

    /// The topic segment / wire name of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Fan => "fan",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

/// Device identifier, unique within its [`DeviceKind`].
///
/// Guaranteed non-empty and free of topic-reserved characters, so it can be
/// spliced into a topic without further checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyId`] for an empty string and
    /// [`ValidationError::ReservedCharacter`] when the id contains `/`, `+`
    /// or `#`.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if let Some(character) = id.chars().find(|c| RESERVED.contains(c)) {
            return Err(ValidationError::ReservedCharacter { id, character });
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// Immutable identity of one device: its kind plus its id.
///
/// Ordering is by kind first, then id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIdentity {
    pub kind: DeviceKind,
    pub id: DeviceId,
}

impl DeviceIdentity {
    #[must_use]
    pub fn new(kind: DeviceKind, id: DeviceId) -> Self {
        Self { kind, id }
    }

    /// Parse both halves from raw strings.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the kind is unknown or the id is
    /// not addressable.
    pub fn parse(kind: &str, id: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            kind: kind.parse()?,
            id: id.parse()?,
        })
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

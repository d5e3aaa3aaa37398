//! Topic addressing — pure mapping between device identities and topics.
//!
//! | Purpose | Topic |
//! |---------|-------|
//! | Command | `<base>/<type>/<id>/command` |
//! | Status | `<base>/<type>/<id>/status` |
//! | Status subscription | `<base>/+/+/status` |
//!
//! The base namespace may span several levels (`smart_home/v1`). Parsing is
//! relative to the configured base, so `<type>/<id>/<suffix>` must be exactly
//! three levels below it.

use crate::error::MalformedTopicError;
use crate::id::{DeviceId, DeviceIdentity, DeviceKind};

/// Default base namespace.
pub const DEFAULT_BASE: &str = "smart_home/v1";

const COMMAND_SUFFIX: &str = "command";
const STATUS_SUFFIX: &str = "status";

/// Topic scheme rooted at one base namespace.
///
/// Passed to every agent, dispatcher and aggregator so several isolated
/// namespaces can share one broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self::new(DEFAULT_BASE)
    }
}

impl Topics {
    /// Create a scheme for the given base. Trailing `/` are ignored.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let base = base.trim_end_matches('/').to_string();
        Self { base }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// `<base>/<type>/<id>/command`
    #[must_use]
    pub fn command_topic(&self, identity: &DeviceIdentity) -> String {
        self.compose(identity, COMMAND_SUFFIX)
    }

    /// `<base>/<type>/<id>/status`
    #[must_use]
    pub fn status_topic(&self, identity: &DeviceIdentity) -> String {
        self.compose(identity, STATUS_SUFFIX)
    }

    /// `<base>/+/+/status`: every device status under this base.
    #[must_use]
    pub fn status_wildcard(&self) -> String {
        format!("{}/+/+/{STATUS_SUFFIX}", self.base)
    }

    /// Recover the identity from a status topic.
    ///
    /// # Errors
    ///
    /// Returns a [`MalformedTopicError`] when the topic is outside the base,
    /// does not have exactly `<type>/<id>/status` below it, or names an
    /// unknown type or an unaddressable id.
    pub fn parse_status_topic(&self, topic: &str) -> Result<DeviceIdentity, MalformedTopicError> {
        self.parse(topic, STATUS_SUFFIX)
    }

    /// Recover the identity from a command topic.
    ///
    /// # Errors
    ///
    /// Same rules as [`parse_status_topic`](Self::parse_status_topic), with
    /// `command` as the required suffix.
    pub fn parse_command_topic(&self, topic: &str) -> Result<DeviceIdentity, MalformedTopicError> {
        self.parse(topic, COMMAND_SUFFIX)
    }

    fn compose(&self, identity: &DeviceIdentity, suffix: &str) -> String {
        format!("{}/{}/{}/{suffix}", self.base, identity.kind, identity.id)
    }

    fn parse(
        &self,
        topic: &str,
        expected: &'static str,
    ) -> Result<DeviceIdentity, MalformedTopicError> {
        let relative = topic
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| MalformedTopicError::OutsideBase {
                topic: topic.to_string(),
                base: self.base.clone(),
            })?;

        let segments: Vec<&str> = relative.split('/').collect();
        let [kind, id, suffix] = segments.as_slice() else {
            return Err(MalformedTopicError::SegmentCount {
                topic: topic.to_string(),
                found: segments.len(),
            });
        };

        if *suffix != expected {
            return Err(MalformedTopicError::UnexpectedSuffix {
                topic: topic.to_string(),
                expected,
            });
        }

        let kind: DeviceKind = kind
            .parse()
            .map_err(|_| MalformedTopicError::UnknownKind {
                topic: topic.to_string(),
                kind: (*kind).to_string(),
            })?;
        let id = DeviceId::new(*id).map_err(|source| MalformedTopicError::InvalidId {
            topic: topic.to_string(),
            source,
        })?;

        Ok(DeviceIdentity::new(kind, id))
    }
}

/// MQTT-style filter matching: `+` matches exactly one level, a trailing
/// `#` matches the remaining levels (including none).
#[must_use]
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(id: &str) -> DeviceIdentity {
        DeviceIdentity::parse("light", id).unwrap()
    }

    #[test]
    fn should_compose_command_topic() {
        let topics = Topics::new("home");
        assert_eq!(
            topics.command_topic(&light("living_room_light")),
            "home/light/living_room_light/command"
        );
    }

    #[test]
    fn should_compose_status_topic_under_multi_level_base() {
        let topics = Topics::default();
        let fan = DeviceIdentity::parse("fan", "bedroom_fan").unwrap();
        assert_eq!(
            topics.status_topic(&fan),
            "smart_home/v1/fan/bedroom_fan/status"
        );
    }

    #[test]
    fn should_ignore_trailing_separator_in_base() {
        let topics = Topics::new("home/");
        assert_eq!(topics.status_wildcard(), "home/+/+/status");
    }

    #[test]
    fn should_roundtrip_status_topic_for_every_kind() {
        for base in ["home", DEFAULT_BASE] {
            let topics = Topics::new(base);
            for kind in DeviceKind::ALL {
                let identity = DeviceIdentity::new(kind, DeviceId::new("dev-1.a_b").unwrap());
                let topic = topics.status_topic(&identity);
                assert_eq!(topics.parse_status_topic(&topic).unwrap(), identity);
            }
        }
    }

    #[test]
    fn should_reject_topic_with_too_few_segments() {
        let topics = Topics::new("home");
        let result = topics.parse_status_topic("home/light/status");
        assert_eq!(
            result,
            Err(MalformedTopicError::SegmentCount {
                topic: "home/light/status".to_string(),
                found: 2,
            })
        );
    }

    #[test]
    fn should_reject_topic_with_too_many_segments() {
        let topics = Topics::new("home");
        let result = topics.parse_status_topic("home/light/a/b/status");
        assert!(matches!(
            result,
            Err(MalformedTopicError::SegmentCount { found: 4, .. })
        ));
    }

    #[test]
    fn should_reject_command_topic_as_status() {
        let topics = Topics::new("home");
        let result = topics.parse_status_topic("home/light/lamp/command");
        assert!(matches!(
            result,
            Err(MalformedTopicError::UnexpectedSuffix {
                expected: "status",
                ..
            })
        ));
    }

    #[test]
    fn should_reject_topic_outside_base() {
        let topics = Topics::new("home");
        let result = topics.parse_status_topic("office/light/lamp/status");
        assert!(matches!(
            result,
            Err(MalformedTopicError::OutsideBase { .. })
        ));
    }

    #[test]
    fn should_not_treat_base_prefix_as_base() {
        let topics = Topics::new("home");
        let result = topics.parse_status_topic("homestead/light/lamp/status");
        assert!(matches!(
            result,
            Err(MalformedTopicError::OutsideBase { .. })
        ));
    }

    #[test]
    fn should_reject_unknown_kind_segment() {
        let topics = Topics::new("home");
        let result = topics.parse_status_topic("home/thermostat/hall/status");
        assert!(matches!(
            result,
            Err(MalformedTopicError::UnknownKind { .. })
        ));
    }

    #[test]
    fn should_reject_empty_id_segment() {
        let topics = Topics::new("home");
        let result = topics.parse_status_topic("home/light//status");
        assert!(matches!(result, Err(MalformedTopicError::InvalidId { .. })));
    }

    #[test]
    fn should_parse_command_topic() {
        let topics = Topics::new("home");
        let identity = topics
            .parse_command_topic("home/light/lamp/command")
            .unwrap();
        assert_eq!(identity, light("lamp"));
    }

    #[test]
    fn should_match_single_level_wildcards() {
        assert!(topic_matches("home/+/+/status", "home/light/lamp/status"));
        assert!(!topic_matches("home/+/+/status", "home/light/lamp/command"));
        assert!(!topic_matches("home/+/+/status", "home/light/status"));
        assert!(!topic_matches("home/+/status", "home/light/lamp/status"));
    }

    #[test]
    fn should_match_multi_level_wildcard() {
        assert!(topic_matches("home/#", "home/light/lamp/status"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("office/#", "home/light"));
    }

    #[test]
    fn should_match_exact_topic_only() {
        assert!(topic_matches("home/light/lamp/command", "home/light/lamp/command"));
        assert!(!topic_matches("home/light/lamp/command", "home/light/lamp2/command"));
    }
}

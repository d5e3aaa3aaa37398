//! Status aggregator — controller-side cache of the latest status per device.
//!
//! The cache is never authoritative: it holds whatever status arrived last
//! for each `(type, id)`, overwriting unconditionally. Out-of-order delivery
//! can therefore show stale data until the next status lands.
//!
//! The topic decides which device a status belongs to; the payload's own
//! `type`/`id` are not used as a fallback.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use homewire_domain::error::HomewireError;
use homewire_domain::id::DeviceIdentity;
use homewire_domain::status::StatusMessage;
use homewire_domain::topic::Topics;

use crate::ports::InboundMessage;

const DEFAULT_FEED_CAPACITY: usize = 64;

/// Shared handle to the status cache.
///
/// Cloning is cheap; every clone sees the same cache and feed, so the event
/// loop and a display loop can each hold one.
#[derive(Clone)]
pub struct StatusAggregator {
    topics: Topics,
    cache: Arc<RwLock<HashMap<DeviceIdentity, StatusMessage>>>,
    feed: broadcast::Sender<StatusMessage>,
}

impl StatusAggregator {
    #[must_use]
    pub fn new(topics: Topics) -> Self {
        Self::with_feed_capacity(topics, DEFAULT_FEED_CAPACITY)
    }

    /// Create an aggregator whose update feed buffers `capacity` statuses per
    /// lagging observer.
    #[must_use]
    pub fn with_feed_capacity(topics: Topics, capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity);
        Self {
            topics,
            cache: Arc::new(RwLock::new(HashMap::new())),
            feed,
        }
    }

    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Receive every status accepted *after* this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusMessage> {
        self.feed.subscribe()
    }

    /// Decode a status payload and store it under the topic's identity.
    ///
    /// # Errors
    ///
    /// Returns [`HomewireError::Decode`] for an undecodable payload and
    /// [`HomewireError::MalformedTopic`] for a topic outside the status
    /// scheme. The cache is untouched in both cases.
    pub fn handle_status(&self, topic: &str, payload: &[u8]) -> Result<StatusMessage, HomewireError> {
        let status = StatusMessage::decode(payload)?;
        let identity = self.topics.parse_status_topic(topic)?;

        if status.identity() != identity {
            tracing::warn!(
                topic,
                payload_device = %status.identity(),
                "status payload disagrees with its topic, keeping topic identity"
            );
        }

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity, status.clone());

        // broadcast::send only fails when nobody is listening.
        let _ = self.feed.send(status.clone());
        Ok(status)
    }

    /// Feed one inbound message; failures are logged and the message dropped.
    pub fn handle_message(&self, message: &InboundMessage) {
        match self.handle_status(&message.topic, &message.payload) {
            Ok(status) => tracing::debug!(
                topic = %message.topic,
                device = %status.identity(),
                retained = message.retained,
                "status cached"
            ),
            Err(err) => tracing::warn!(
                topic = %message.topic,
                payload = %message.payload_lossy(),
                error = ?err,
                "status dropped"
            ),
        }
    }

    /// Latest status seen for one device.
    #[must_use]
    pub fn latest(&self, identity: &DeviceIdentity) -> Option<StatusMessage> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    /// Latest status of every device seen, ordered by type then id.
    #[must_use]
    pub fn all_latest(&self) -> Vec<StatusMessage> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(&DeviceIdentity, &StatusMessage)> = cache.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, status)| status.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use homewire_domain::command::Command;
    use homewire_domain::id::{DeviceId, DeviceKind};
    use homewire_domain::state::DeviceState;

    use super::*;

    fn aggregator() -> StatusAggregator {
        StatusAggregator::new(Topics::new("home"))
    }

    fn identity(kind: &str, id: &str) -> DeviceIdentity {
        DeviceIdentity::parse(kind, id).unwrap()
    }

    fn status_at(id: &str, state: DeviceState, secs: i64) -> StatusMessage {
        StatusMessage::at(
            DeviceId::new(id).unwrap(),
            state,
            DateTime::from_timestamp(secs, 0).unwrap(),
        )
    }

    #[test]
    fn should_cache_status_under_topic_identity() {
        let agg = aggregator();
        let status = status_at("lamp", DeviceState::initial(DeviceKind::Light), 10);
        agg.handle_status("home/light/lamp/status", &status.encode())
            .unwrap();

        assert_eq!(agg.latest(&identity("light", "lamp")), Some(status));
        assert_eq!(agg.latest(&identity("light", "other")), None);
    }

    #[test]
    fn should_keep_last_delivered_status() {
        let agg = aggregator();
        let off = DeviceState::initial(DeviceKind::Light);
        let on = off.apply(&Command::set_state(true)).unwrap();
        let first = status_at("lamp", off, 10);
        let second = status_at("lamp", on, 20);

        agg.handle_status("home/light/lamp/status", &first.encode())
            .unwrap();
        agg.handle_status("home/light/lamp/status", &second.encode())
            .unwrap();

        assert_eq!(agg.latest(&identity("light", "lamp")), Some(second));
    }

    #[test]
    fn should_overwrite_even_with_older_timestamp() {
        let agg = aggregator();
        let newer = status_at("lamp", DeviceState::initial(DeviceKind::Light), 20);
        let older = status_at(
            "lamp",
            DeviceState::with_level(DeviceKind::Light, 10).unwrap(),
            10,
        );

        agg.handle_status("home/light/lamp/status", &newer.encode())
            .unwrap();
        agg.handle_status("home/light/lamp/status", &older.encode())
            .unwrap();

        assert_eq!(agg.latest(&identity("light", "lamp")), Some(older));
    }

    #[test]
    fn should_drop_non_json_payload_without_touching_cache() {
        let agg = aggregator();
        let status = status_at("lamp", DeviceState::initial(DeviceKind::Light), 10);
        agg.handle_status("home/light/lamp/status", &status.encode())
            .unwrap();

        let result = agg.handle_status("home/light/lamp/status", b"garbage");
        assert!(matches!(result, Err(HomewireError::Decode(_))));
        agg.handle_message(&InboundMessage::new("home/light/lamp/status", "{"));

        assert_eq!(agg.latest(&identity("light", "lamp")), Some(status));
        assert_eq!(agg.all_latest().len(), 1);
    }

    #[test]
    fn should_drop_status_on_malformed_topic() {
        let agg = aggregator();
        let status = status_at("lamp", DeviceState::initial(DeviceKind::Light), 10);
        let result = agg.handle_status("home/light/status", &status.encode());

        assert!(matches!(result, Err(HomewireError::MalformedTopic(_))));
        assert!(agg.all_latest().is_empty());
    }

    #[test]
    fn should_trust_topic_over_payload_identity() {
        let agg = aggregator();
        let status = status_at("impostor", DeviceState::initial(DeviceKind::Light), 10);
        agg.handle_status("home/light/lamp/status", &status.encode())
            .unwrap();

        assert!(agg.latest(&identity("light", "lamp")).is_some());
        assert!(agg.latest(&identity("light", "impostor")).is_none());
    }

    #[test]
    fn should_list_all_latest_sorted_by_type_then_id() {
        let agg = aggregator();
        for (topic, id, kind) in [
            ("home/fan/bedroom_fan/status", "bedroom_fan", DeviceKind::Fan),
            ("home/light/porch/status", "porch", DeviceKind::Light),
            ("home/light/hall/status", "hall", DeviceKind::Light),
        ] {
            let status = status_at(id, DeviceState::initial(kind), 1);
            agg.handle_status(topic, &status.encode()).unwrap();
        }

        let ids: Vec<String> = agg
            .all_latest()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(ids, vec!["hall", "porch", "bedroom_fan"]);
    }

    #[test]
    fn should_share_cache_between_clones() {
        let agg = aggregator();
        let display = agg.clone();
        let status = status_at("fan1", DeviceState::initial(DeviceKind::Fan), 1);
        agg.handle_status("home/fan/fan1/status", &status.encode())
            .unwrap();

        assert_eq!(display.latest(&identity("fan", "fan1")), Some(status));
    }

    #[tokio::test]
    async fn should_notify_observers_of_accepted_status() {
        let agg = aggregator();
        let mut rx = agg.subscribe();
        let status = status_at("fan1", DeviceState::initial(DeviceKind::Fan), 1);

        agg.handle_status("home/fan/fan1/status", b"nope").unwrap_err();
        agg.handle_status("home/fan/fan1/status", &status.encode())
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), status);
    }
}

//! The broker and its client handles.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use homewire_app::ports::{
    EventSink, EventStream, InboundMessage, OutboundMessage, Transport, TransportEvent,
};
use homewire_domain::error::TransportError;
use homewire_domain::topic::topic_matches;

struct Session {
    events: EventSink,
    filters: Vec<String>,
}

impl Session {
    /// Only fails once the client dropped its stream.
    fn deliver(&self, client_id: &str, event: TransportEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(client_id, "client stream dropped, event discarded");
        }
    }

    fn wants(&self, topic: &str) -> bool {
        self.filters.iter().any(|filter| topic_matches(filter, topic))
    }
}

#[derive(Default)]
struct BrokerState {
    retained: BTreeMap<String, Vec<u8>>,
    sessions: HashMap<String, Session>,
}

/// Shared in-process broker. Clones refer to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `client_id`. The returned stream starts with
    /// [`TransportEvent::Connected`].
    ///
    /// A second connect with the same id takes the session over; the
    /// previous stream ends.
    #[must_use]
    pub fn connect(
        &self,
        client_id: impl Into<String>,
    ) -> (MemoryClient, EventStream) {
        let client_id = client_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            events: tx,
            filters: Vec::new(),
        };
        session.deliver(&client_id, TransportEvent::Connected);

        if self
            .lock()
            .sessions
            .insert(client_id.clone(), session)
            .is_some()
        {
            tracing::info!(%client_id, "session taken over by new connection");
        }
        tracing::debug!(%client_id, "client connected");

        let client = MemoryClient {
            client_id,
            broker: self.clone(),
        };
        (client, rx)
    }

    /// Drop a client's connection and immediately restore it: its
    /// subscriptions are discarded, then `Disconnected` and `Connected` are
    /// emitted on its stream. Returns `false` for an unknown client.
    pub fn interrupt(&self, client_id: &str) -> bool {
        let mut state = self.lock();
        let Some(session) = state.sessions.get_mut(client_id) else {
            return false;
        };
        session.filters.clear();
        session.deliver(client_id, TransportEvent::Disconnected);
        session.deliver(client_id, TransportEvent::Connected);
        tracing::debug!(client_id, "connection interrupted");
        true
    }

    /// Current retained payload for `topic`.
    #[must_use]
    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.lock().retained.get(topic).cloned()
    }

    #[must_use]
    pub fn is_connected(&self, client_id: &str) -> bool {
        self.lock().sessions.contains_key(client_id)
    }

    /// Close every session; all client streams end.
    pub fn shutdown(&self) {
        self.lock().sessions.clear();
    }

    fn subscribe(&self, client_id: &str, filter: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        let BrokerState { retained, sessions } = &mut *state;
        let session = sessions
            .get_mut(client_id)
            .ok_or(TransportError::NotConnected)?;

        if !session.filters.iter().any(|f| f == filter) {
            session.filters.push(filter.to_string());
        }

        for (topic, payload) in retained.iter() {
            if topic_matches(filter, topic) {
                let message = InboundMessage {
                    topic: topic.clone(),
                    payload: payload.clone(),
                    retained: true,
                };
                session.deliver(client_id, TransportEvent::Message(message));
            }
        }
        Ok(())
    }

    fn publish(&self, client_id: &str, message: OutboundMessage) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.sessions.contains_key(client_id) {
            return Err(TransportError::NotConnected);
        }

        if message.retain {
            if message.payload.is_empty() {
                state.retained.remove(&message.topic);
            } else {
                state
                    .retained
                    .insert(message.topic.clone(), message.payload.clone());
            }
        }

        for (id, session) in &state.sessions {
            if session.wants(&message.topic) {
                let inbound = InboundMessage {
                    topic: message.topic.clone(),
                    payload: message.payload.clone(),
                    retained: false,
                };
                session.deliver(id, TransportEvent::Message(inbound));
            }
        }
        Ok(())
    }

    fn disconnect(&self, client_id: &str) {
        if self.lock().sessions.remove(client_id).is_some() {
            tracing::debug!(client_id, "client disconnected");
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One client's connection to a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryClient {
    client_id: String,
    broker: MemoryBroker,
}

impl MemoryClient {
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl Transport for MemoryClient {
    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = self.broker.subscribe(&self.client_id, filter);
        async { result }
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = self.broker.publish(&self.client_id, message);
        async { result }
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.broker.disconnect(&self.client_id);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(event: TransportEvent) -> InboundMessage {
        match event {
            TransportEvent::Message(message) => message,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn should_emit_connected_first() {
        let broker = MemoryBroker::new();
        let (_client, mut rx) = broker.connect("a");
        assert_eq!(rx.recv().await, Some(TransportEvent::Connected));
        assert!(broker.is_connected("a"));
    }

    #[tokio::test]
    async fn should_deliver_to_matching_subscribers_only() {
        let broker = MemoryBroker::new();
        let (publisher, _) = broker.connect("pub");
        let (sub, mut sub_rx) = broker.connect("sub");
        let (other, mut other_rx) = broker.connect("other");
        sub_rx.recv().await;
        other_rx.recv().await;

        sub.subscribe("home/+/+/status").await.unwrap();
        other.subscribe("home/+/+/command").await.unwrap();
        publisher
            .publish(OutboundMessage::transient("home/light/lamp/status", "x"))
            .await
            .unwrap();

        let received = message(sub_rx.recv().await.unwrap());
        assert_eq!(received.topic, "home/light/lamp/status");
        assert!(!received.retained);
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_hand_latest_retained_message_to_new_subscriber() {
        let broker = MemoryBroker::new();
        let (publisher, _) = broker.connect("pub");
        publisher
            .publish(OutboundMessage::retained("home/fan/f/status", "old"))
            .await
            .unwrap();
        publisher
            .publish(OutboundMessage::retained("home/fan/f/status", "new"))
            .await
            .unwrap();

        let (late, mut rx) = broker.connect("late");
        rx.recv().await;
        late.subscribe("home/+/+/status").await.unwrap();

        let received = message(rx.recv().await.unwrap());
        assert_eq!(received.payload, b"new");
        assert!(received.retained);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_not_retain_transient_messages() {
        let broker = MemoryBroker::new();
        let (publisher, _) = broker.connect("pub");
        publisher
            .publish(OutboundMessage::transient("home/light/l/command", "x"))
            .await
            .unwrap();
        assert_eq!(broker.retained("home/light/l/command"), None);
    }

    #[tokio::test]
    async fn should_clear_retained_on_empty_payload() {
        let broker = MemoryBroker::new();
        let (publisher, _) = broker.connect("pub");
        publisher
            .publish(OutboundMessage::retained("t", "v"))
            .await
            .unwrap();
        publisher
            .publish(OutboundMessage::retained("t", Vec::<u8>::new()))
            .await
            .unwrap();
        assert_eq!(broker.retained("t"), None);
    }

    #[tokio::test]
    async fn should_deliver_once_when_several_filters_match() {
        let broker = MemoryBroker::new();
        let (client, mut rx) = broker.connect("c");
        rx.recv().await;
        client.subscribe("home/#").await.unwrap();
        client.subscribe("home/+/+/status").await.unwrap();
        client
            .publish(OutboundMessage::transient("home/light/l/status", "x"))
            .await
            .unwrap();

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_drop_subscriptions_and_reconnect_on_interrupt() {
        let broker = MemoryBroker::new();
        let (client, mut rx) = broker.connect("c");
        rx.recv().await;
        client.subscribe("t").await.unwrap();

        assert!(broker.interrupt("c"));
        assert_eq!(rx.recv().await, Some(TransportEvent::Disconnected));
        assert_eq!(rx.recv().await, Some(TransportEvent::Connected));

        client
            .publish(OutboundMessage::transient("t", "x"))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
        assert!(!broker.interrupt("unknown"));
    }

    #[tokio::test]
    async fn should_refuse_publish_after_disconnect_and_end_stream() {
        let broker = MemoryBroker::new();
        let (client, mut rx) = broker.connect("c");
        rx.recv().await;
        client.disconnect().await.unwrap();

        let result = client.publish(OutboundMessage::transient("t", "x")).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn should_end_previous_stream_on_session_takeover() {
        let broker = MemoryBroker::new();
        let (_first, mut first_rx) = broker.connect("dup");
        let (_second, mut second_rx) = broker.connect("dup");

        assert_eq!(first_rx.recv().await, Some(TransportEvent::Connected));
        assert_eq!(first_rx.recv().await, None);
        assert_eq!(second_rx.recv().await, Some(TransportEvent::Connected));
    }

    #[tokio::test]
    async fn should_close_all_streams_on_shutdown() {
        let broker = MemoryBroker::new();
        let (_a, mut a_rx) = broker.connect("a");
        let (_b, mut b_rx) = broker.connect("b");
        a_rx.recv().await;
        b_rx.recv().await;

        broker.shutdown();
        assert_eq!(a_rx.recv().await, None);
        assert_eq!(b_rx.recv().await, None);
    }

    #[tokio::test]
    async fn should_deliver_every_message_of_a_burst_to_an_idle_reader() {
        let broker = MemoryBroker::new();
        let (client, mut rx) = broker.connect("slow");
        rx.recv().await;
        client.subscribe("t").await.unwrap();

        for i in 0..1_000 {
            client
                .publish(OutboundMessage::transient("t", i.to_string()))
                .await
                .unwrap();
        }

        let mut received = 0;
        while let Ok(event) = rx.try_recv() {
            assert_eq!(message(event).payload, received.to_string().into_bytes());
            received += 1;
        }
        assert_eq!(received, 1_000);
    }
}

//! Device agent — bridges one device's state to the transport.
//!
//! The agent is the sole owner of its [`DeviceState`]. It reacts to the
//! events of its own connection:
//!
//! | Event | Reaction |
//! |-------|----------|
//! | `Connected` | subscribe to the command topic, publish current status |
//! | `Disconnected` | mark the link down, wait for the substrate |
//! | `Message` on the command topic | decode, apply, replace state, publish status |
//!
//! Every accepted command republishes status, even when the new state equals
//! the old one. Rejected or undecodable commands are logged and dropped.

use homewire_domain::command::Command;
use homewire_domain::error::{HomewireError, TransportError};
use homewire_domain::id::{DeviceId, DeviceIdentity};
use homewire_domain::state::DeviceState;
use homewire_domain::status::StatusMessage;
use homewire_domain::topic::Topics;

use crate::ports::{
    EventStream, InboundMessage, LinkState, OutboundMessage, Transport, TransportEvent,
};

/// Owner of one simulated device.
pub struct DeviceAgent<T> {
    identity: DeviceIdentity,
    state: DeviceState,
    command_topic: String,
    status_topic: String,
    link: LinkState,
    transport: T,
}

impl<T: Transport> DeviceAgent<T> {
    /// Create an agent for device `id` starting at `initial`.
    ///
    /// The device type is taken from the state variant, so identity and
    /// state can never disagree.
    pub fn new(id: DeviceId, initial: DeviceState, topics: &Topics, transport: T) -> Self {
        let identity = DeviceIdentity::new(initial.kind(), id);
        Self {
            command_topic: topics.command_topic(&identity),
            status_topic: topics.status_topic(&identity),
            identity,
            state: initial,
            link: LinkState::Disconnected,
            transport,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    #[must_use]
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    #[must_use]
    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Drain the connection's events until the substrate closes the stream,
    /// then hand back the final state.
    pub async fn run(mut self, mut events: EventStream) -> DeviceState {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::info!(device = %self.identity, "event stream closed, agent stopped");
        self.state
    }

    /// React to one transport event. Never fails: problems are logged and
    /// the triggering event is dropped.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected().await,
            TransportEvent::Disconnected => {
                self.link = LinkState::Disconnected;
                tracing::warn!(device = %self.identity, "transport lost, waiting for reconnect");
            }
            TransportEvent::Message(message) => self.on_message(&message).await,
        }
    }

    /// Decode and apply one command payload, publishing the resulting status.
    ///
    /// # Errors
    ///
    /// - [`HomewireError::Decode`] if the payload is not a command object
    /// - [`HomewireError::Command`] if the device refuses it
    /// - [`HomewireError::Transport`] if the new status could not be
    ///   published; the state change itself is kept
    ///
    /// The state is untouched in the first two cases.
    pub async fn handle_command(&mut self, payload: &[u8]) -> Result<&DeviceState, HomewireError> {
        let command = Command::decode(payload)?;
        self.state = self.state.apply(&command)?;
        tracing::debug!(
            device = %self.identity,
            action = %command.action,
            value = %command.value,
            "command applied"
        );
        self.publish_status().await?;
        Ok(&self.state)
    }

    /// Publish the current state as a retained status message.
    ///
    /// # Errors
    ///
    /// Returns the substrate's [`TransportError`] if the publish is refused.
    pub async fn publish_status(&self) -> Result<StatusMessage, TransportError> {
        let status = StatusMessage::new(self.identity.id.clone(), self.state);
        self.transport
            .publish(OutboundMessage::retained(
                self.status_topic.clone(),
                status.encode(),
            ))
            .await?;
        tracing::info!(device = %self.identity, topic = %self.status_topic, "status published");
        Ok(status)
    }

    async fn on_connected(&mut self) {
        self.link = LinkState::Connected;
        tracing::info!(device = %self.identity, topic = %self.command_topic, "connected, subscribing");

        if let Err(err) = self.transport.subscribe(&self.command_topic).await {
            tracing::error!(device = %self.identity, error = ?err, "failed to subscribe to command topic");
            return;
        }
        if let Err(err) = self.publish_status().await {
            tracing::error!(device = %self.identity, error = ?err, "failed to publish initial status");
        }
    }

    async fn on_message(&mut self, message: &InboundMessage) {
        if message.topic != self.command_topic {
            tracing::debug!(
                device = %self.identity,
                topic = %message.topic,
                "ignoring message outside command topic"
            );
            return;
        }

        let outcome = self.handle_command(&message.payload).await.map(|_| ());
        if let Err(err) = outcome {
            let payload = message.payload_lossy();
            match &err {
                HomewireError::Transport(_) => tracing::error!(
                    device = %self.identity,
                    topic = %message.topic,
                    %payload,
                    error = ?err,
                    "state changed but status publish failed"
                ),
                _ => tracing::warn!(
                    device = %self.identity,
                    topic = %message.topic,
                    %payload,
                    error = ?err,
                    "command dropped"
                ),
            }
        }
    }
}

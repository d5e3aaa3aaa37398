//! Command dispatcher — publishes commands to a device's command topic.
//!
//! Fire-and-forget: a dispatch succeeds as soon as the substrate accepts the
//! publish. Nothing is validated locally and nothing is acknowledged; a
//! command the device rejects and a command lost in transit look the same
//! from here. The only observable outcome is the device's next status (or
//! its absence).

use homewire_domain::command::Command;
use homewire_domain::error::TransportError;
use homewire_domain::id::DeviceIdentity;
use homewire_domain::topic::Topics;

use crate::ports::{OutboundMessage, Transport};

/// Sends commands over one transport connection.
#[derive(Clone)]
pub struct CommandDispatcher<T> {
    topics: Topics,
    transport: T,
}

impl<T: Transport> CommandDispatcher<T> {
    pub fn new(topics: Topics, transport: T) -> Self {
        Self { topics, transport }
    }

    /// Publish `command` (not retained) to the device's command topic.
    ///
    /// # Errors
    ///
    /// Returns the substrate's [`TransportError`] if it refuses the publish.
    pub async fn dispatch(
        &self,
        target: &DeviceIdentity,
        command: &Command,
    ) -> Result<(), TransportError> {
        let topic = self.topics.command_topic(target);
        let message = OutboundMessage::transient(topic.clone(), command.encode());

        if let Err(err) = self.transport.publish(message).await {
            tracing::error!(device = %target, %topic, error = ?err, "command publish failed");
            return Err(err);
        }

        tracing::info!(
            device = %target,
            %topic,
            action = %command.action,
            value = %command.value,
            "command sent"
        );
        Ok(())
    }
}

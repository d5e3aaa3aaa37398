//! rumqttc-backed transport and its event-loop driver.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use homewire_app::ports::{
    EventSink, EventStream, InboundMessage, LinkState, OutboundMessage, Transport, TransportEvent,
};
use homewire_domain::error::TransportError;

use crate::config::MqttConfig;
use crate::error::MqttError;

const REQUEST_CAPACITY: usize = 16;

/// One MQTT client connection.
pub struct MqttTransport {
    client_id: String,
    client: AsyncClient,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Connect to the broker and spawn the event-loop driver.
    ///
    /// Waits for the broker's CONNACK so an unreachable broker fails startup.
    /// The returned stream starts with [`TransportEvent::Connected`].
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Connection`] when the broker cannot be reached,
    /// [`MqttError::Refused`] when it rejects the handshake and
    /// [`MqttError::Timeout`] when it does not answer in time.
    pub async fn connect(
        config: &MqttConfig,
        client_id: impl Into<String>,
    ) -> Result<(Self, EventStream), MqttError> {
        let client_id = client_id.into();
        let mut options = MqttOptions::new(
            client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        tracing::info!(
            %client_id,
            host = %config.broker_host,
            port = config.broker_port,
            "connecting to MQTT broker"
        );
        tokio::time::timeout(config.connect_timeout(), wait_for_connack(&mut event_loop))
            .await
            .map_err(|_| MqttError::Timeout {
                secs: config.connect_timeout_secs,
            })??;
        tracing::info!(%client_id, "MQTT connection established");

        let (tx, rx) = mpsc::unbounded_channel();
        // rx is alive, cannot fail
        let _ = tx.send(TransportEvent::Connected);
        let driver = Driver::new(client_id.clone(), tx, config.reconnect_delay());
        let driver = tokio::spawn(driver.run(event_loop));

        let transport = Self {
            client_id,
            client,
            driver: Mutex::new(Some(driver)),
        };
        Ok((transport, rx))
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Disconnect and give the driver `grace` to flush queued requests.
    ///
    /// A driver still running after `grace` (typically stuck reconnecting to
    /// a vanished broker) is aborted, which ends the event stream either
    /// way. Returns `true` when the driver finished on its own.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        if let Err(err) = self.disconnect().await {
            tracing::warn!(client_id = %self.client_id, error = ?err, "disconnect request failed");
        }
        let handle = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return true;
        };

        let flushed = join_or_abort(handle, grace).await;
        if !flushed {
            tracing::warn!(client_id = %self.client_id, "broker unreachable, closed without flush");
        }
        flushed
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(handle) = self
            .driver
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Transport for MqttTransport {
    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        let filter = filter.to_string();
        async move {
            self.client
                .subscribe(filter, QoS::AtLeastOnce)
                .await
                .map_err(|err| MqttError::from(err).into_transport())
        }
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            self.client
                .publish(
                    message.topic,
                    QoS::AtLeastOnce,
                    message.retain,
                    message.payload,
                )
                .await
                .map_err(|err| MqttError::from(err).into_transport())
        }
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            self.client
                .disconnect()
                .await
                .map_err(|err| MqttError::from(err).into_transport())
        }
    }
}

/// Wait up to `grace` for `handle`, aborting it past that.
async fn join_or_abort(mut handle: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::error!(error = %err, "MQTT driver task failed");
            true
        }
        Err(_) => {
            handle.abort();
            false
        }
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), MqttError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(MqttError::Refused(code)),
                };
            }
            Ok(_) => {}
            Err(ConnectionError::ConnectionRefused(code)) => return Err(MqttError::Refused(code)),
            Err(err) => return Err(MqttError::Connection(err)),
        }
    }
}

/// Where the driver pulls notifications from.
trait EventSource: Send {
    fn poll_event(&mut self) -> impl Future<Output = Result<Event, ConnectionError>> + Send;
}

impl EventSource for EventLoop {
    fn poll_event(&mut self) -> impl Future<Output = Result<Event, ConnectionError>> + Send {
        self.poll()
    }
}

/// What the driver does with one poll result.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Emit(TransportEvent),
    /// Connection error: forward the event if any, then wait before the next
    /// poll (rumqttc reconnects on it).
    Backoff(Option<TransportEvent>),
    Stop,
    Skip,
}

fn translate(event: Event) -> Step {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
            Step::Emit(TransportEvent::Connected)
        }
        Event::Incoming(Packet::Publish(publish)) => {
            Step::Emit(TransportEvent::Message(InboundMessage {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
                retained: publish.retain,
            }))
        }
        Event::Outgoing(Outgoing::Disconnect) => Step::Stop,
        _ => Step::Skip,
    }
}

/// Turns event-loop notifications into [`TransportEvent`]s.
///
/// Never waits on the consumer: the sink is unbounded, so the event loop
/// keeps servicing queued publishes while a component is busy.
struct Driver {
    client_id: String,
    link: LinkState,
    events: EventSink,
    reconnect_delay: Duration,
}

impl Driver {
    /// The handshake already happened, so the link starts up.
    fn new(client_id: String, events: EventSink, reconnect_delay: Duration) -> Self {
        Self {
            client_id,
            link: LinkState::Connected,
            events,
            reconnect_delay,
        }
    }

    fn step(&mut self, polled: Result<Event, ConnectionError>) -> Step {
        match polled {
            Ok(event) => {
                let step = translate(event);
                if step == Step::Emit(TransportEvent::Connected) {
                    if self.link == LinkState::Disconnected {
                        tracing::info!(client_id = %self.client_id, "MQTT connection re-established");
                    }
                    self.link = LinkState::Connected;
                }
                step
            }
            Err(ConnectionError::RequestsDone) => Step::Stop,
            Err(err) => {
                tracing::error!(client_id = %self.client_id, error = %err, "MQTT connection error, retrying");
                if self.link == LinkState::Connected {
                    self.link = LinkState::Disconnected;
                    Step::Backoff(Some(TransportEvent::Disconnected))
                } else {
                    Step::Backoff(None)
                }
            }
        }
    }

    async fn run(mut self, mut source: impl EventSource) {
        loop {
            let (event, backoff) = match self.step(source.poll_event().await) {
                Step::Emit(event) => (Some(event), false),
                Step::Backoff(event) => (event, true),
                Step::Skip => continue,
                Step::Stop => break,
            };
            if let Some(event) = event {
                if self.events.send(event).is_err() {
                    tracing::debug!(client_id = %self.client_id, "event stream dropped");
                    break;
                }
            }
            if backoff {
                tokio::time::sleep(self.reconnect_delay).await;
            }
        }
        tracing::info!(client_id = %self.client_id, "MQTT driver stopped");
    }
}

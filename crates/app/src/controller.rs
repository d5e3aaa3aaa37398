//! Controller endpoint — a dispatcher and an aggregator sharing one
//! connection.
//!
//! On every `Connected` the controller (re)subscribes to the status
//! wildcard; retained statuses then arrive immediately, so the cache is
//! populated right after connecting. Inbound messages go to the aggregator.

use std::sync::Arc;

use homewire_domain::topic::Topics;

use crate::aggregator::StatusAggregator;
use crate::dispatcher::CommandDispatcher;
use crate::ports::{EventStream, LinkState, Transport, TransportEvent};

pub struct Controller<T> {
    transport: Arc<T>,
    dispatcher: CommandDispatcher<Arc<T>>,
    aggregator: StatusAggregator,
    link: LinkState,
}

impl<T: Transport> Controller<T> {
    pub fn new(topics: Topics, transport: T) -> Self {
        let transport = Arc::new(transport);
        Self {
            dispatcher: CommandDispatcher::new(topics.clone(), Arc::clone(&transport)),
            aggregator: StatusAggregator::new(topics),
            transport,
            link: LinkState::Disconnected,
        }
    }

    /// A dispatcher bound to this controller's connection.
    #[must_use]
    pub fn dispatcher(&self) -> CommandDispatcher<Arc<T>> {
        self.dispatcher.clone()
    }

    /// A handle to the shared status cache.
    #[must_use]
    pub fn aggregator(&self) -> StatusAggregator {
        self.aggregator.clone()
    }

    #[must_use]
    pub fn transport(&self) -> Arc<T> {
        Arc::clone(&self.transport)
    }

    #[must_use]
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    /// Drain the connection's events until the substrate closes the stream.
    pub async fn run(mut self, mut events: EventStream) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::info!("event stream closed, controller stopped");
    }

    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                self.link = LinkState::Connected;
                let filter = self.aggregator.topics().status_wildcard();
                match self.transport.subscribe(&filter).await {
                    Ok(()) => tracing::info!(%filter, "controller subscribed to device statuses"),
                    Err(err) => {
                        tracing::error!(%filter, error = ?err, "status subscription failed");
                    }
                }
            }
            TransportEvent::Disconnected => {
                self.link = LinkState::Disconnected;
                tracing::warn!("controller transport lost, waiting for reconnect");
            }
            TransportEvent::Message(message) => self.aggregator.handle_message(&message),
        }
    }
}

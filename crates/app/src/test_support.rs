//! In-memory fake of the transport port for unit tests.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use homewire_domain::error::TransportError;

use crate::ports::{OutboundMessage, Transport};

/// Records every request; can be told to fail publishes.
#[derive(Default)]
pub struct RecordingTransport {
    pub subscriptions: Mutex<Vec<String>>,
    pub published: Mutex<Vec<OutboundMessage>>,
    pub disconnected: AtomicBool,
    pub fail_publish: AtomicBool,
}

impl RecordingTransport {
    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.subscriptions.lock().unwrap().push(filter.to_string());
        async { Ok(()) }
    }

    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = if self.fail_publish.load(Ordering::SeqCst) {
            Err(TransportError::NotConnected)
        } else {
            self.published.lock().unwrap().push(message);
            Ok(())
        };
        async { result }
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.disconnected.store(true, Ordering::SeqCst);
        async { Ok(()) }
    }
}

//! Echo handler: the reference handler and the behaviour both links start from.

use crate::connection::{MessageSink, SendError};
use crate::handler::MessageHandler;
use crate::protocol::Message;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{trace, warn};

/// Sends every received message straight back, unchanged.
#[derive(Debug, Default)]
pub struct EchoMessageHandler {
    sink: Mutex<Option<MessageSink>>,
}

impl EchoMessageHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The sink of the current connection, if still attached.
    pub fn sink(&self) -> Option<MessageSink> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attach(&self, sink: MessageSink) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn detach(&self) {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Sends `message` on the attached connection.
    pub async fn send_message(&self, message: &Message) -> Result<(), SendError> {
        match self.sink() {
            Some(sink) => sink.send_message(message).await,
            None => Err(SendError::Closed),
        }
    }

    pub async fn echo(&self, message: Message) {
        trace!(len = message.len(), "Echoing message");
        if let Err(e) = self.send_message(&message).await {
            warn!(error = %e, "Failed to echo message");
        }
    }
}

impl MessageHandler for EchoMessageHandler {
    fn on_connected(self: Arc<Self>, sink: MessageSink) {
        self.attach(sink);
    }

    async fn on_message(&self, message: Message) {
        self.echo(message).await;
    }

    fn on_disconnected(self: Arc<Self>) {
        self.detach();
    }
}

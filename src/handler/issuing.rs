//! Issuing link handler.

use crate::connection::MessageSink;
use crate::handler::{EchoMessageHandler, MessageHandler};
use crate::protocol::Message;
use std::sync::Arc;
use tracing::info;

/// Handles the issuing link. Replies with the received message for now.
#[derive(Debug, Default)]
pub struct IssuingMessageHandler {
    echo: EchoMessageHandler,
}

impl IssuingMessageHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageHandler for IssuingMessageHandler {
    fn on_connected(self: Arc<Self>, sink: MessageSink) {
        info!(conn = sink.connection_id(), "Issuing link up");
        self.echo.attach(sink);
    }

    async fn on_message(&self, message: Message) {
        self.echo.echo(message).await;
    }

    fn on_disconnected(self: Arc<Self>) {
        info!("Issuing link down");
        self.echo.detach();
    }
}

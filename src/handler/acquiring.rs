//! Acquiring link handler.
//!
//! Besides handling inbound traffic, the acquiring connection is the target
//! for messages injected from outside (see [`crate::bridge`]). The handler
//! registers itself in an [`ActiveConnectionRegistry`] while connected.

use crate::connection::{MessageSink, SendError};
use crate::handler::{EchoMessageHandler, MessageHandler};
use crate::protocol::Message;
use crate::registry::ActiveConnectionRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Handles the acquiring link and accepts out-of-band sends.
pub struct AcquiringMessageHandler {
    echo: EchoMessageHandler,
    registry: Arc<ActiveConnectionRegistry<AcquiringMessageHandler>>,
}

impl AcquiringMessageHandler {
    pub fn new(registry: Arc<ActiveConnectionRegistry<AcquiringMessageHandler>>) -> Self {
        Self {
            echo: EchoMessageHandler::new(),
            registry,
        }
    }

    /// Sends `message` on this handler's connection.
    ///
    /// Fails with [`SendError::Closed`] once the connection is gone.
    pub async fn send_message(&self, message: &Message) -> Result<(), SendError> {
        self.echo.send_message(message).await
    }

    pub fn connection_id(&self) -> Option<u64> {
        self.echo.sink().map(|sink| sink.connection_id())
    }
}

impl MessageHandler for AcquiringMessageHandler {
    fn on_connected(self: Arc<Self>, sink: MessageSink) {
        info!(conn = sink.connection_id(), "Acquiring link up");
        self.echo.attach(sink);
        self.registry.register(Arc::clone(&self));
    }

    async fn on_message(&self, message: Message) {
        self.echo.echo(message).await;
    }

    fn on_disconnected(self: Arc<Self>) {
        info!(conn = ?self.connection_id(), "Acquiring link down");
        self.registry.unregister(&self);
        self.echo.detach();
    }

    fn dispose(&self) {
        // A preempted handler must stop receiving injected messages right away
        if self.registry.unregister(self) {
            debug!("Disposed handler removed from registry");
        }
    }
}

impl fmt::Debug for AcquiringMessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiringMessageHandler")
            .field("conn", &self.connection_id())
            .finish()
    }
}

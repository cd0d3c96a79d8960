//! Out-of-band send into the acquiring link.
//!
//! This is the contract an external front end (such as an HTTP endpoint)
//! calls to inject a message: look up the active acquiring handler and send
//! through it. When no connection is active the request fails immediately;
//! nothing is queued or retried.

use crate::connection::SendError;
use crate::handler::AcquiringMessageHandler;
use crate::protocol::Message;
use crate::registry::ActiveConnectionRegistry;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned to a bridge caller.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No acquiring connection is active
    #[error("no active acquiring connection")]
    NoActiveConnection,

    /// The active connection rejected or failed the send
    #[error("send failed: {0}")]
    Send(#[from] SendError),
}

/// Sends externally supplied messages on the active acquiring connection.
#[derive(Debug, Clone)]
pub struct AcquiringBridge {
    registry: Arc<ActiveConnectionRegistry<AcquiringMessageHandler>>,
}

impl AcquiringBridge {
    pub fn new(registry: Arc<ActiveConnectionRegistry<AcquiringMessageHandler>>) -> Self {
        Self { registry }
    }

    /// Forwards `message` to the active acquiring connection.
    pub async fn send_message(&self, message: Message) -> Result<(), BridgeError> {
        let Some(handler) = self.registry.current() else {
            debug!("Bridge send rejected, no active acquiring connection");
            return Err(BridgeError::NoActiveConnection);
        };

        handler.send_message(&message).await.map_err(|e| {
            warn!(conn = ?handler.connection_id(), error = %e, "Bridge send failed");
            BridgeError::from(e)
        })
    }
}

//! The reply channel handed to message handlers.

use crate::connection::pipeline::{ConnectionPipeline, SendError};
use crate::protocol::Message;
use std::fmt;
use std::sync::Arc;

/// Sends messages on the connection a handler is attached to.
///
/// Cheap to clone. Once the connection is closed every send fails with
/// [`SendError::Closed`].
#[derive(Clone)]
pub struct MessageSink {
    pipeline: Arc<ConnectionPipeline>,
}

impl MessageSink {
    pub fn new(pipeline: Arc<ConnectionPipeline>) -> Self {
        Self { pipeline }
    }

    /// Encodes `message` into a pooled buffer and writes it as one frame.
    ///
    /// The buffer goes back to the pool on every outcome, including an
    /// oversize message that never reaches the wire.
    pub async fn send_message(&self, message: &Message) -> Result<(), SendError> {
        let mut lease = self.pipeline.pool().lease();
        message.encode_into(&mut lease)?;
        self.pipeline.send_lease(lease).await
    }

    /// Identifier of the underlying connection.
    pub fn connection_id(&self) -> u64 {
        self.pipeline.id()
    }

    pub fn is_closed(&self) -> bool {
        self.pipeline.is_closed()
    }
}

impl fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSink")
            .field("conn", &self.pipeline.id())
            .field("closed", &self.pipeline.is_closed())
            .finish()
    }
}

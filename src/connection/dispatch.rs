//! Per-connection message dispatch.
//!
//! The receive loop pushes each frame's lease into a bounded queue; a single
//! dispatcher task per connection drains it. The dispatcher owns every lease it
//! receives: it builds the [`Message`], releases the lease, and only then calls
//! the handler. Messages of one connection are therefore handled one at a time,
//! in arrival order, while the receive loop keeps reading.

use crate::buffer::BufferLease;
use crate::handler::MessageHandler;
use crate::protocol::Message;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Default number of frames that may wait for the dispatcher.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Creates the queue between a receive loop and its dispatcher.
pub fn dispatch_queue(depth: usize) -> (mpsc::Sender<BufferLease>, mpsc::Receiver<BufferLease>) {
    mpsc::channel(depth.max(1))
}

/// Spawns the dispatcher for one connection.
///
/// The task ends when the queue's sender is dropped and the queue is drained.
/// After `cancel` fires, queued frames are released without being delivered.
pub fn spawn_dispatcher<H: MessageHandler>(
    conn: u64,
    handler: Arc<H>,
    mut queue: mpsc::Receiver<BufferLease>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(lease) = queue.recv().await {
            if cancel.is_cancelled() {
                trace!(conn, len = lease.len(), "Dropping frame from closed connection");
                lease.release();
                continue;
            }

            let message = Message::parse(&lease);
            lease.release();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!(conn, "Message handling abandoned on close");
                }
                _ = handler.on_message(message) => {}
            }
        }
    })
}

//! Message Handler Module
//!
//! A message handler is the application side of one connection. The server
//! creates a fresh handler for every accepted connection and drives it through
//! a fixed lifecycle:
//!
//! ```text
//! on_connected(sink) ──> on_message(msg)* ──> on_disconnected() ──> dispose()
//! ```
//!
//! `on_message` calls for one connection never overlap and always arrive in
//! the order the frames were received. No `on_message` call starts after
//! `on_disconnected`. When a connection is preempted by a newer one, `dispose`
//! may run before `on_disconnected`.
//!
//! ## Variants
//!
//! - [`EchoMessageHandler`]: replies to every message with the same bytes
//! - [`IssuingMessageHandler`]: handler for the issuing link
//! - [`AcquiringMessageHandler`]: handler for the acquiring link; registers
//!   itself so out-of-band callers can inject messages

pub mod acquiring;
pub mod echo;
pub mod issuing;

pub use acquiring::AcquiringMessageHandler;
pub use echo::EchoMessageHandler;
pub use issuing::IssuingMessageHandler;

use crate::connection::MessageSink;
use crate::protocol::Message;
use std::future::Future;
use std::sync::Arc;

/// Callbacks invoked by a connection over its lifetime.
pub trait MessageHandler: Send + Sync + 'static {
    /// The connection became the active one on its link.
    fn on_connected(self: Arc<Self>, sink: MessageSink);

    /// One received message.
    fn on_message(&self, message: Message) -> impl Future<Output = ()> + Send;

    /// The connection's receive loop ended.
    fn on_disconnected(self: Arc<Self>);

    /// Releases handler resources. Called exactly once per handler.
    fn dispose(&self) {}
}

/// Creates one handler per accepted connection.
pub trait HandlerFactory: Send + Sync + 'static {
    type Handler: MessageHandler;

    fn create(&self) -> Self::Handler;
}

impl<F, H> HandlerFactory for F
where
    F: Fn() -> H + Send + Sync + 'static,
    H: MessageHandler,
{
    type Handler = H;

    fn create(&self) -> H {
        self()
    }
}

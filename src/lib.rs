//! # Postilion Proxy - TCP Transport for Card-Payment Links
//!
//! Postilion Proxy terminates two long-lived TCP links, "issuing" and
//! "acquiring", carrying length-prefixed binary messages. Each frame is a
//! 2-byte big-endian length header followed by that many payload bytes.
//! Every received payload is handed to a per-connection message handler, and
//! handlers can send framed messages back on the same connection.
//!
//! ## Features
//!
//! - **Exact framing**: frames split or coalesced across reads are reassembled
//! - **Single active connection per link**: a new client preempts the old one
//! - **Ordered dispatch**: handlers see a connection's messages one at a time, in order
//! - **Serialized writes**: concurrent senders never interleave frame bytes
//! - **Pooled buffers**: a shared pool backs every received frame
//! - **Out-of-band sends**: external callers can inject messages into the
//!   active acquiring connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Postilion Proxy                              │
//! │                                                                         │
//! │  ┌──────────────────┐                       ┌──────────────────┐        │
//! │  │ ConnectionServer │                       │ ConnectionServer │        │
//! │  │ "issuing" :5000  │                       │ "acquiring" :5001│        │
//! │  └────────┬─────────┘                       └────────┬─────────┘        │
//! │           │                                          │                  │
//! │           ▼                                          ▼                  │
//! │  ┌──────────────────┐   ┌─────────────┐     ┌──────────────────┐        │
//! │  │ConnectionPipeline│──>│ BufferPool  │<────│ConnectionPipeline│        │
//! │  └────────┬─────────┘   │  (shared)   │     └────────┬─────────┘        │
//! │           │             └─────────────┘              │                  │
//! │           ▼                                          ▼                  │
//! │  ┌──────────────────┐                       ┌──────────────────┐        │
//! │  │ IssuingMessage   │                       │ AcquiringMessage │        │
//! │  │ Handler          │                       │ Handler          │        │
//! │  └──────────────────┘                       └────────┬─────────┘        │
//! │                                                      │ registers        │
//! │                                                      ▼                  │
//! │                     ┌─────────────────┐     ┌──────────────────┐        │
//! │                     │ AcquiringBridge │────>│ ActiveConnection │        │
//! │                     │ (external send) │     │ Registry         │        │
//! │                     └─────────────────┘     └──────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use postilion_proxy::buffer::BufferPool;
//! use postilion_proxy::connection::{ConnectionServer, ServerConfig};
//! use postilion_proxy::handler::IssuingMessageHandler;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let pool = BufferPool::new();
//!     let server = ConnectionServer::new(
//!         ServerConfig::new("issuing"),
//!         IssuingMessageHandler::new,
//!         pool,
//!     );
//!     server.listen("0.0.0.0:5000").await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: frame header parsing/emission and the [`Message`] type
//! - [`buffer`]: the shared buffer pool and RAII leases
//! - [`connection`]: listeners, per-connection pipelines, and message sinks
//! - [`handler`]: the handler lifecycle trait and the link handlers
//! - [`registry`]: the active acquiring handler slot
//! - [`bridge`]: out-of-band sends into the acquiring link
//! - [`config`]: process configuration
//!
//! ## Design Highlights
//!
//! ### Leases
//!
//! The receive loop copies each frame into a leased pool buffer before
//! handing it to the dispatcher. Every lease is released exactly once, on
//! success, on handler failure, and on teardown with frames still queued.
//!
//! ### Preemption
//!
//! Each link keeps at most one active connection. Accepting a new client
//! atomically replaces the active slot and disposes the previous connection,
//! which closes its socket and stops its receive loop.

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod registry;

// Re-export commonly used types for convenience
pub use bridge::{AcquiringBridge, BridgeError};
pub use buffer::{BufferLease, BufferPool};
pub use config::{ConfigError, ProxyConfig, DEFAULT_ACQUIRING_PORT, DEFAULT_HOST, DEFAULT_ISSUING_PORT};
pub use connection::{ConnectionServer, ConnectionStats, MessageSink, SendError, ServerConfig};
pub use handler::{
    AcquiringMessageHandler, EchoMessageHandler, HandlerFactory, IssuingMessageHandler,
    MessageHandler,
};
pub use protocol::{FrameError, Message};
pub use registry::ActiveConnectionRegistry;

/// Version of Postilion Proxy
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Connection Module
//!
//! This module terminates the TCP links. Each link has its own
//! [`ConnectionServer`]; each accepted client gets a [`ConnectionPipeline`]
//! running its receive loop as an independent task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionServer (per link)                 │
//! │        accept loop ── active slot (one connection)          │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ spawn task per client
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionPipeline                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Parse frame │───>│ Lease copy  │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │ queue       │
//! │                                               ▼             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Write frame │<───│ MessageSink │<───│ Dispatcher  │      │
//! │  │ (locked)    │    └─────────────┘    │ on_message  │      │
//! │  └─────────────┘                       └─────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Single active connection**: a new client preempts the previous one
//! - **Serialized writes**: concurrent senders never interleave frames
//! - **Pooled buffers**: received frames are copied into leased buffers
//! - **Statistics**: Tracks connection and frame metrics
//!
//! ## Example
//!
//! ```ignore
//! use postilion_proxy::buffer::BufferPool;
//! use postilion_proxy::connection::{ConnectionServer, ServerConfig};
//! use postilion_proxy::handler::EchoMessageHandler;
//!
//! let server = ConnectionServer::new(
//!     ServerConfig::new("issuing"),
//!     EchoMessageHandler::new,
//!     BufferPool::new(),
//! );
//! let addr = server.listen("0.0.0.0:5000").await?;
//! // ...
//! server.shutdown().await;
//! ```

pub mod dispatch;
pub mod pipeline;
pub mod server;
pub mod sink;
pub mod stats;

// Re-export commonly used types
pub use pipeline::{ConnectionError, ConnectionPipeline, SendError};
pub use server::{Connection, ConnectionServer, ServerConfig};
pub use sink::MessageSink;
pub use stats::ConnectionStats;

//! Connection Server
//!
//! One server per link. It accepts TCP connections, builds a pipeline and a
//! fresh handler for each, and keeps at most one of them active.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. accept()
//!        │
//!        ▼
//! 2. pipeline + handler + dispatcher created
//!        │
//!        ▼
//! 3. activate: swap the active slot and call handler.on_connected(sink)
//!        │    under one lock, then dispose the previous connection
//!        │
//!        ▼
//! 4. receive loop (until EOF / error / close / shutdown)
//!        │
//!        ▼
//! 5. drain dispatcher, handler.on_disconnected()
//!        │
//!        ▼
//! 6. deactivate: clear the slot if still ours, dispose
//! ```
//!
//! The active slot is guarded by a plain mutex that is never held while a
//! connection is disposed: the previous entry is swapped out under the lock
//! and torn down after it is released. `on_connected` runs inside that critical
//! section, so handlers become connected in the same order their connections
//! became active, and a late `on_connected` never overrides a newer one.
//! Errors from one connection end that
//! connection only; the accept loop keeps running.

use crate::buffer::BufferPool;
use crate::connection::dispatch::{dispatch_queue, spawn_dispatcher, DEFAULT_QUEUE_DEPTH};
use crate::connection::pipeline::{ConnectionError, ConnectionPipeline};
use crate::connection::sink::MessageSink;
use crate::connection::stats::ConnectionStats;
use crate::handler::{HandlerFactory, MessageHandler};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-link server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Link name used in logs ("issuing", "acquiring")
    pub link: String,
    /// Frames that may wait for a connection's dispatcher
    pub dispatch_queue_depth: usize,
}

impl ServerConfig {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            dispatch_queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub fn with_dispatch_queue_depth(mut self, depth: usize) -> Self {
        self.dispatch_queue_depth = depth;
        self
    }
}

/// One accepted connection: its pipeline and its handler.
pub struct Connection<H> {
    id: u64,
    peer: SocketAddr,
    pipeline: Arc<ConnectionPipeline>,
    handler: Arc<H>,
    disposed: AtomicBool,
}

impl<H: MessageHandler> Connection<H> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Closes the transport and disposes the handler. Idempotent.
    pub fn dispose(&self) {
        self.pipeline.close();
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.handler.dispose();
            debug!(conn = self.id, "Connection disposed");
        }
    }
}

struct ServerInner<F: HandlerFactory> {
    config: ServerConfig,
    factory: F,
    pool: BufferPool,
    stats: Arc<ConnectionStats>,
    active: Mutex<Option<Arc<Connection<F::Handler>>>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

/// Accepts connections for one link and enforces a single active connection.
pub struct ConnectionServer<F: HandlerFactory> {
    inner: Arc<ServerInner<F>>,
}

impl<F: HandlerFactory> ConnectionServer<F> {
    /// Creates a server that builds handlers with `factory`.
    pub fn new(config: ServerConfig, factory: F, pool: BufferPool) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                factory,
                pool,
                stats: Arc::new(ConnectionStats::new()),
                active: Mutex::new(None),
                next_id: AtomicU64::new(1),
                shutdown: CancellationToken::new(),
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Binds `addr` and starts accepting connections in the background.
    ///
    /// Returns the bound address (useful with port 0).
    pub async fn listen(&self, addr: impl ToSocketAddrs) -> io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(link = %self.inner.config.link, addr = %local_addr, "Listening");

        let inner = Arc::clone(&self.inner);
        self.inner.tasks.spawn(inner.accept_loop(listener));
        Ok(local_addr)
    }

    pub fn link(&self) -> &str {
        &self.inner.config.link
    }

    pub fn stats(&self) -> &Arc<ConnectionStats> {
        &self.inner.stats
    }

    pub fn pool(&self) -> &BufferPool {
        &self.inner.pool
    }

    /// Identifier of the active connection, if any.
    pub fn active_connection_id(&self) -> Option<u64> {
        self.inner.lock_active().as_ref().map(|conn| conn.id)
    }

    /// Stops accepting, disposes the active connection and waits for every
    /// connection task to finish.
    pub async fn shutdown(&self) {
        info!(link = %self.inner.config.link, "Shutting down");
        self.inner.shutdown.cancel();

        let active = self.inner.lock_active().take();
        if let Some(conn) = active {
            conn.dispose();
        }

        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        info!(link = %self.inner.config.link, "Stopped");
    }
}

impl<F: HandlerFactory> Drop for ConnectionServer<F> {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
        let active = self.inner.lock_active().take();
        if let Some(conn) = active {
            conn.dispose();
        }
    }
}

impl<F: HandlerFactory> ServerInner<F> {
    fn lock_active(&self) -> MutexGuard<'_, Option<Arc<Connection<F::Handler>>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Main loop that accepts incoming connections
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let inner = Arc::clone(&self);
                    self.tasks.spawn(inner.serve(stream, peer));
                }
                Err(e) => {
                    error!(link = %self.config.link, error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
        debug!(link = %self.config.link, "Accept loop stopped");
    }

    /// Runs one connection from accept to teardown.
    async fn serve(self: Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = stream.set_nodelay(true) {
            debug!(conn = id, error = %e, "Failed to set TCP_NODELAY");
        }

        self.stats.connection_opened();
        let cancel = self.shutdown.child_token();
        let pipeline = Arc::new(ConnectionPipeline::new(
            id,
            stream,
            self.pool.clone(),
            Arc::clone(&self.stats),
            cancel.clone(),
        ));
        let handler = Arc::new(self.factory.create());
        let connection = Arc::new(Connection {
            id,
            peer,
            pipeline: Arc::clone(&pipeline),
            handler: Arc::clone(&handler),
            disposed: AtomicBool::new(false),
        });
        info!(link = %self.config.link, conn = id, client = %peer, "Client connected");

        let (queue_tx, queue_rx) = dispatch_queue(self.config.dispatch_queue_depth);
        let dispatcher = spawn_dispatcher(id, Arc::clone(&handler), queue_rx, cancel);

        self.activate(&connection, MessageSink::new(Arc::clone(&pipeline)));

        let result = pipeline.run_receive_loop(queue_tx).await;
        match &result {
            Ok(()) => info!(link = %self.config.link, conn = id, client = %peer, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == io::ErrorKind::ConnectionReset =>
            {
                debug!(link = %self.config.link, conn = id, client = %peer, "Connection reset by client")
            }
            Err(e) => warn!(link = %self.config.link, conn = id, client = %peer, error = %e, "Connection error"),
        }

        // No message may reach the handler after on_disconnected
        if let Err(e) = dispatcher.await {
            error!(conn = id, error = %e, "Dispatcher task failed");
        }
        handler.on_disconnected();

        self.deactivate(&connection);
        self.stats.connection_closed();
    }

    /// Makes `connection` the active one, connects its handler, and disposes
    /// its predecessor.
    fn activate(&self, connection: &Arc<Connection<F::Handler>>, sink: MessageSink) {
        let previous = {
            let mut active = self.lock_active();
            let previous = active.replace(Arc::clone(connection));
            Arc::clone(&connection.handler).on_connected(sink);
            previous
        };

        if let Some(previous) = previous {
            info!(
                link = %self.config.link,
                old = previous.id,
                new = connection.id,
                "New connection preempts active connection"
            );
            self.stats.connection_preempted();
            previous.dispose();
        }
    }

    /// Clears the active slot if it still holds `connection`, then disposes it.
    fn deactivate(&self, connection: &Arc<Connection<F::Handler>>) {
        {
            let mut active = self.lock_active();
            if active
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, connection))
            {
                *active = None;
            }
        }
        connection.dispose();
    }
}

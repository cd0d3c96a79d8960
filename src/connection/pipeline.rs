//! Connection Pipeline
//!
//! A pipeline owns one duplex byte stream and turns it into a sequence of
//! frames on the way in, and a serialized sequence of frames on the way out.
//!
//! ## Receive Loop
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ┌────────────────────────────┐              │
//! │  │ Extract every buffered     │<─────────┐   │
//! │  │ complete frame             │          │   │
//! │  └─────────────┬──────────────┘          │   │
//! │                │ copy into a lease       │   │
//! │                ▼                         │   │
//! │  ┌────────────────────────────┐          │   │
//! │  │ Hand lease to dispatcher   │          │   │
//! │  └─────────────┬──────────────┘          │   │
//! │                │ drop consumed bytes     │   │
//! │                ▼                         │   │
//! │  ┌────────────────────────────┐          │   │
//! │  │ Read more (or cancel/EOF)  │──────────┘   │
//! │  └────────────────────────────┘              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The loop only suspends on the socket once nothing more can be parsed from
//! what is already buffered. It never waits for a message to be processed,
//! only for the dispatch queue to accept the frame.
//!
//! ## Send Path
//!
//! Writers take the write lock, assemble header and payload into one buffer,
//! then write and flush it as one unit, so frames from concurrent senders never
//! interleave. Nothing of a failed write is kept for later. An uncontended
//! lock with a writable socket completes on the first poll; otherwise the
//! sender suspends until the lock is free. The guard is held across every
//! await of the write, so the lock is released only after the write finished
//! or failed.
//!
//! ## Closing
//!
//! [`ConnectionPipeline::close`] is idempotent and never fails. It cancels the
//! receive loop and any in-flight write, and drops whichever halves of the
//! stream it can reach. A half held by a running task is dropped by that task
//! as soon as it observes the cancellation.

use crate::buffer::{BufferLease, BufferPool};
use crate::connection::stats::ConnectionStats;
use crate::protocol::framing::{emit_header, try_extract_frame, FrameError, HEADER_LEN};
use bytes::{Buf, BytesMut};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Initial read buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Minimum spare capacity before a read
const MIN_READ_CAPACITY: usize = 1024;

/// Initial capacity of the buffer a frame is assembled in before writing
const WRITE_BUFFER_SIZE: usize = 8 * 1024;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Write half plus the buffer each outgoing frame is assembled in.
///
/// The buffer is reset before every frame, so bytes of a failed write are
/// never sent ahead of a later frame.
struct FrameWriter {
    stream: BoxedWriter,
    frame: BytesMut,
}

impl FrameWriter {
    fn new(stream: BoxedWriter) -> Self {
        Self {
            stream,
            frame: BytesMut::with_capacity(WRITE_BUFFER_SIZE),
        }
    }

    async fn write_frame(&mut self, header: &[u8; HEADER_LEN], payload: &[u8]) -> io::Result<()> {
        self.frame.clear();
        self.frame.reserve(HEADER_LEN + payload.len());
        self.frame.extend_from_slice(header);
        self.frame.extend_from_slice(payload);

        self.stream.write_all(&self.frame).await?;
        self.stream.flush().await
    }
}

/// Errors that end a receive loop.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The peer closed the stream in the middle of a frame
    #[error("Unexpected end of stream with {buffered} bytes buffered")]
    UnexpectedEof { buffered: usize },

    /// The pipeline was closed, or its loop was already started
    #[error("Pipeline closed")]
    Closed,
}

/// Errors returned to a sender.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The pipeline was closed before or during the write
    #[error("connection closed")]
    Closed,

    /// The payload cannot be framed
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The underlying write or flush failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Framed read/write pipeline over one duplex stream.
pub struct ConnectionPipeline {
    id: u64,
    reader: Mutex<Option<BoxedReader>>,
    writer: tokio::sync::Mutex<Option<FrameWriter>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    pool: BufferPool,
    stats: Arc<ConnectionStats>,
}

impl ConnectionPipeline {
    /// Wraps `stream` in a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `id` - Connection identifier used in logs
    /// * `stream` - The duplex byte stream (usually a `TcpStream`)
    /// * `pool` - Pool that received frames are copied into
    /// * `stats` - Shared link statistics
    /// * `cancel` - Token that stops the receive loop and pending writes
    pub fn new<S>(
        id: u64,
        stream: S,
        pool: BufferPool,
        stats: Arc<ConnectionStats>,
        cancel: CancellationToken,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader: BoxedReader = Box::new(read_half);
        let writer: BoxedWriter = Box::new(write_half);

        Self {
            id,
            reader: Mutex::new(Some(reader)),
            writer: tokio::sync::Mutex::new(Some(FrameWriter::new(writer))),
            closed: AtomicBool::new(false),
            cancel,
            pool,
            stats,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// True once the pipeline was closed or its token cancelled.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Runs the receive loop until end of stream, cancellation or an error.
    ///
    /// Each complete frame is copied into a [`BufferLease`] and sent on
    /// `dispatch`; the receiver owns the lease from then on. The read half of
    /// the stream is dropped before this returns, whatever the outcome.
    ///
    /// Can only run once per pipeline.
    pub async fn run_receive_loop(
        &self,
        dispatch: mpsc::Sender<BufferLease>,
    ) -> Result<(), ConnectionError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut reader) = reader else {
            return Err(ConnectionError::Closed);
        };
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let mut buffer = BytesMut::with_capacity(INITIAL_BUFFER_SIZE);
        let result = self.receive_frames(&mut reader, &mut buffer, &dispatch).await;

        // Complete the read side
        drop(reader);
        trace!(conn = self.id, ok = result.is_ok(), "Receive loop finished");
        result
    }

    async fn receive_frames(
        &self,
        reader: &mut BoxedReader,
        buffer: &mut BytesMut,
        dispatch: &mpsc::Sender<BufferLease>,
    ) -> Result<(), ConnectionError> {
        loop {
            // Hand off as many frames as the buffered data holds
            let mut consumed = 0;
            while let Some((frame, _)) = try_extract_frame(&buffer[consumed..]) {
                let lease = self.pool.lease_from(frame.payload());
                consumed += frame.encoded_len();
                self.stats.frame_received();
                trace!(conn = self.id, len = lease.len(), "Received frame");

                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(()),
                    sent = dispatch.send(lease) => {
                        if sent.is_err() {
                            // Dispatcher is gone; the returned lease was dropped
                            debug!(conn = self.id, "Dispatch queue closed");
                            return Ok(());
                        }
                    }
                }
            }

            // Everything before the last frame boundary is consumed; the partial
            // frame after it stays buffered until more bytes arrive
            buffer.advance(consumed);
            self.reserve_for_next_frame(buffer);

            let n = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    trace!(conn = self.id, "Receive loop cancelled");
                    return Ok(());
                }
                read = reader.read_buf(buffer) => read?,
            };

            if n == 0 {
                if buffer.is_empty() {
                    return Ok(());
                }
                return Err(ConnectionError::UnexpectedEof {
                    buffered: buffer.len(),
                });
            }

            self.stats.bytes_read(n);
            trace!(conn = self.id, bytes = n, buffered = buffer.len(), "Read data");
        }
    }

    /// Makes room for the rest of a partially buffered frame.
    fn reserve_for_next_frame(&self, buffer: &mut BytesMut) {
        let wanted = if buffer.len() >= HEADER_LEN {
            let length = u16::from_be_bytes([buffer[0], buffer[1]]) as usize;
            (HEADER_LEN + length).saturating_sub(buffer.len())
        } else {
            0
        }
        .max(MIN_READ_CAPACITY);

        if buffer.capacity() - buffer.len() < wanted {
            buffer.reserve(wanted.max(INITIAL_BUFFER_SIZE));
        }
    }

    /// Writes one frame carrying `payload`.
    ///
    /// Fails with [`SendError::Frame`] if the payload exceeds the 16-bit length
    /// limit, and with [`SendError::Closed`] if the pipeline is closed before or
    /// while writing.
    pub async fn send(&self, payload: &[u8]) -> Result<(), SendError> {
        let header = emit_header(payload.len())?;
        if self.is_closed() {
            return Err(SendError::Closed);
        }

        let mut writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                trace!(conn = self.id, "Write lock contended");
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(SendError::Closed),
                    guard = self.writer.lock() => guard,
                }
            }
        };

        let Some(frame_writer) = writer.as_mut() else {
            return Err(SendError::Closed);
        };

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SendError::Closed),
            written = frame_writer.write_frame(&header, payload) => written.map_err(SendError::from),
        };

        self.drop_writer_if_closed(&mut writer);

        match &result {
            Ok(()) => {
                self.stats.frame_sent(HEADER_LEN + payload.len());
                trace!(conn = self.id, len = payload.len(), "Sent frame");
            }
            Err(SendError::Closed) => trace!(conn = self.id, "Write cancelled by close"),
            Err(e) => debug!(conn = self.id, error = %e, "Write failed"),
        }
        result
    }

    /// Drops the write half if the pipeline closed while a send held it.
    ///
    /// close() cannot reach a writer that is locked by a send, so every send
    /// finishes by checking here, whatever the outcome of its write.
    fn drop_writer_if_closed(&self, writer: &mut Option<FrameWriter>) {
        if self.is_closed() && writer.take().is_some() {
            trace!(conn = self.id, "Writer dropped after close");
        }
    }

    /// Writes the contents of `lease` as one frame.
    ///
    /// The lease is released when this returns, on success and on every error.
    pub async fn send_lease(&self, lease: BufferLease) -> Result<(), SendError> {
        self.send(lease.as_slice()).await
    }

    /// Tears the pipeline down.
    ///
    /// Safe to call any number of times from any task.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.cancel.cancel();

        // Loop never started: drop the read half here
        drop(
            self.reader
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        match self.writer.try_lock() {
            Ok(mut writer) => drop(writer.take()),
            Err(_) => trace!(conn = self.id, "Write in flight, writer dropped by sender"),
        }

        debug!(conn = self.id, "Pipeline closed");
    }
}

impl Drop for ConnectionPipeline {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConnectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPipeline")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

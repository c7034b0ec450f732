//! Writable handle to a connected peer.
//!
//! A `PeerConnection` wraps the write half of one peer's socket. The owning
//! session loop keeps the read half; everyone else (the registry, other
//! session loops forwarding to this peer) holds a clone of the handle.
//!
//! # Panic-Free Guarantees
//!
//! This module is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Write failures and timeouts are returned as `ConnectionError`

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio::time::timeout;

use courier_core::{ConnectionId, Frame, PeerId, Role};

/// Default time allowed for a single frame write (10 seconds)
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Type-erased outbound half of a peer connection.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = ConnectionError> + Send>>;

/// Cloneable handle used to write frames to one peer.
///
/// Writers from different session loops are serialized by the internal
/// mutex, so frames written by one forwarder are never interleaved with
/// another's.
#[derive(Clone)]
pub struct PeerConnection {
    id: ConnectionId,
    peer_id: PeerId,
    role: Role,
    sink: Arc<Mutex<FrameSink>>,
    write_timeout: Duration,
}

impl PeerConnection {
    /// Wraps an outbound sink.
    ///
    /// # Arguments
    ///
    /// * `id` - Process-unique number of the underlying connection
    /// * `peer_id` - Identifier the peer registers under
    /// * `role` - Which side of the pairing the peer speaks for
    /// * `sink` - Write half of the transport
    /// * `write_timeout` - Upper bound on a single `send_frame`/`close`
    pub fn new<S>(
        id: ConnectionId,
        peer_id: PeerId,
        role: Role,
        sink: S,
        write_timeout: Duration,
    ) -> Self
    where
        S: Sink<Frame, Error = ConnectionError> + Send + 'static,
    {
        Self {
            id,
            peer_id,
            role,
            sink: Arc::new(Mutex::new(Box::pin(sink))),
            write_timeout,
        }
    }

    /// Creates an in-memory connection backed by a bounded channel.
    ///
    /// Frames sent to the handle come out of the returned receiver. Used
    /// for in-process peers and in tests.
    pub fn channel(
        id: ConnectionId,
        peer_id: PeerId,
        role: Role,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer);
        let sink = tx.sink_map_err(|e| ConnectionError::Io(e.to_string()));
        (
            Self::new(id, peer_id, role, sink, DEFAULT_WRITE_TIMEOUT),
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns true if both handles refer to the same underlying connection.
    pub fn same_connection(&self, other: &PeerConnection) -> bool {
        self.id == other.id
    }

    /// Writes one frame to the peer.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::WriteTimeout` if the write did not finish in time
    /// - `ConnectionError::Io` if the transport rejected the frame
    pub async fn send_frame(&self, frame: Frame) -> Result<(), ConnectionError> {
        let mut sink = self.sink.lock().await;

        match timeout(self.write_timeout, sink.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }

    /// Closes the outbound half, sending a close frame where the transport
    /// has one.
    pub async fn close(&self) -> Result<(), ConnectionError> {
        let mut sink = self.sink.lock().await;

        match timeout(self.write_timeout, sink.close()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }
}

impl fmt::Debug for PeerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnection")
            .field("id", &self.id)
            .field("peer_id", &self.peer_id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Errors that can occur on a single peer connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,
}

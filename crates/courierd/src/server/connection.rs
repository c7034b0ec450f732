//! Session loop for individual peer connections.
//!
//! Each upgraded socket gets its own `PeerSession` that:
//! - Registers the peer's write handle in the registry
//! - Reads inbound frames one at a time
//! - Forwards each frame verbatim to the counterpart, if registered
//! - Closes its handle and removes its own registry entry on exit
//!
//! # Panic-Free Guarantees
//!
//! This module is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::{Frame, PeerId};

use crate::peer::{ConnectionError, PeerConnection};
use crate::registry::RegistryHandle;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the socket or sent a close frame
    Closed,
    /// The server is shutting down
    Shutdown,
    /// Reading from the peer failed
    Failed(String),
    /// The registry was unavailable, so the session never started relaying
    NotRegistered,
}

/// Relay loop for one peer.
///
/// Generic over the inbound stream so the loop can run on a real
/// WebSocket read half or on an in-memory stream.
pub struct PeerSession<S> {
    /// Write handle registered for this peer
    connection: PeerConnection,

    /// Identifier inbound frames are forwarded to
    counterpart: Option<PeerId>,

    /// Read half of the socket
    stream: S,

    /// Handle to the peer registry
    registry: RegistryHandle,

    /// Optional limit on how long to wait for the next frame
    idle_timeout: Option<Duration>,

    /// Server-wide shutdown signal
    cancel_token: CancellationToken,
}

impl<S> PeerSession<S>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    pub fn new(
        connection: PeerConnection,
        counterpart: Option<PeerId>,
        stream: S,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            connection,
            counterpart,
            stream,
            registry,
            idle_timeout: None,
            cancel_token,
        }
    }

    /// Closes the session if no frame arrives within `limit`.
    #[must_use]
    pub fn with_idle_timeout(mut self, limit: Option<Duration>) -> Self {
        self.idle_timeout = limit;
        self
    }

    /// Runs the session to completion.
    ///
    /// Registers, relays until the peer goes away, then closes the write
    /// handle and removes the registry entry if it is still this
    /// connection's.
    pub async fn run(mut self) -> SessionEnd {
        let peer_id = self.connection.peer_id().clone();
        let connection_id = self.connection.id();

        match self.registry.register(self.connection.clone()).await {
            Ok(replaced) => {
                info!(
                    peer_id = %peer_id,
                    connection = %connection_id,
                    role = %self.connection.role(),
                    counterpart = ?self.counterpart.as_ref().map(PeerId::as_str),
                    replaced = ?replaced,
                    "Peer connected"
                );
            }
            Err(e) => {
                warn!(
                    peer_id = %peer_id,
                    connection = %connection_id,
                    error = %e,
                    "Registration failed, closing connection"
                );
                let _ = self.connection.close().await;
                return SessionEnd::NotRegistered;
            }
        }

        let end = self.relay().await;

        if let Err(e) = self.connection.close().await {
            debug!(connection = %connection_id, error = %e, "Close after session end failed");
        }

        match self.registry.remove(peer_id.clone(), connection_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    peer_id = %peer_id,
                    connection = %connection_id,
                    "Identifier already taken over, registry left untouched"
                );
            }
            Err(e) => {
                warn!(peer_id = %peer_id, error = %e, "Failed to remove peer from registry");
            }
        }

        info!(peer_id = %peer_id, connection = %connection_id, end = ?end, "Peer disconnected");
        end
    }

    /// Main relay loop.
    async fn relay(&mut self) -> SessionEnd {
        let cancel_token = self.cancel_token.clone();

        loop {
            let msg = tokio::select! {
                _ = cancel_token.cancelled() => return SessionEnd::Shutdown,
                result = self.read_message() => match result {
                    Ok(msg) => msg,
                    Err(ConnectionError::Eof) => return SessionEnd::Closed,
                    Err(e) => return SessionEnd::Failed(e.to_string()),
                },
            };

            let frame = match msg {
                Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                Message::Binary(data) => Frame::Binary(data),
                // Pings are answered by the transport
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => {
                    debug!(connection = %self.connection.id(), "Peer sent close frame");
                    return SessionEnd::Closed;
                }
            };

            // Field borrows only: the inbound stream need not be Sync
            forward(&self.connection, self.counterpart.as_ref(), &self.registry, frame).await;
        }
    }

    /// Reads the next message, honouring the idle timeout.
    async fn read_message(&mut self) -> Result<Message, ConnectionError> {
        let next = match self.idle_timeout {
            Some(limit) => timeout(limit, self.stream.next())
                .await
                .map_err(|_| ConnectionError::Timeout)?,
            None => self.stream.next().await,
        };

        match next {
            Some(Ok(msg)) => Ok(msg),
            Some(Err(e)) => Err(ConnectionError::Io(e.to_string())),
            None => Err(ConnectionError::Eof),
        }
    }
}

/// Forwards one frame to the counterpart.
///
/// A missing counterpart drops the frame; a failed write is logged.
/// Neither affects this session.
async fn forward(
    connection: &PeerConnection,
    counterpart: Option<&PeerId>,
    registry: &RegistryHandle,
    frame: Frame,
) {
    let Some(target_id) = counterpart else {
        debug!(
            peer_id = %connection.peer_id(),
            kind = frame.kind(),
            "No counterpart supplied, frame dropped"
        );
        return;
    };

    let Some(target) = registry.lookup(target_id).await else {
        debug!(
            from = %connection.peer_id(),
            to = %target_id,
            kind = frame.kind(),
            "Counterpart not connected, frame dropped"
        );
        return;
    };

    if target.same_connection(connection) {
        debug!(peer_id = %target_id, "Counterpart resolves to sender, frame dropped");
        return;
    }

    let len = frame.len();
    match target.send_frame(frame).await {
        Ok(()) => {
            debug!(
                from = %connection.peer_id(),
                to = %target_id,
                bytes = len,
                "Frame forwarded"
            );
        }
        Err(e) => {
            warn!(
                from = %connection.peer_id(),
                to = %target_id,
                target_connection = %target.id(),
                error = %e,
                "Failed to forward frame"
            );
        }
    }
}

/// Converts an outbound frame to a WebSocket message of the same type.
pub fn message_from_frame(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
    }
}

//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to peer events.
//!
//! # Panic-Free Guarantees
//!
//! This module is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use courier_core::{ConnectionId, PeerId};

use super::commands::{PeerEvent, PeerSummary, RegistryCommand, RegistryError};
use crate::peer::PeerConnection;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that is passed to every session task.
///
/// # Usage
///
/// ```ignore
/// let replaced = registry.register(connection.clone()).await?;
///
/// if let Some(target) = registry.lookup(&counterpart).await {
///     target.send_frame(frame).await?;
/// }
///
/// registry.remove(connection.peer_id().clone(), connection.id()).await?;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<PeerEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for subscribing to events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<PeerEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register a connection under its peer identifier, replacing any
    /// previous registration.
    ///
    /// Returns the id of the connection that was superseded, if any.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        connection: PeerConnection,
    ) -> Result<Option<ConnectionId>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                connection,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Look up the connection registered under `peer_id`.
    ///
    /// Returns `None` if nothing is registered or if communication
    /// with the actor fails.
    pub async fn lookup(&self, peer_id: &PeerId) -> Option<PeerConnection> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Lookup {
                peer_id: peer_id.clone(),
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Remove the entry for `peer_id` if it still belongs to `connection_id`.
    ///
    /// Returns `Ok(false)` when the identifier is absent or has been taken
    /// over by a newer connection.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn remove(
        &self,
        peer_id: PeerId,
        connection_id: ConnectionId,
    ) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Remove {
                peer_id,
                connection_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Number of registered peers (0 if the actor is gone).
    pub async fn peer_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::PeerCount { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or_default()
    }

    /// Summaries of all registered peers, ordered by connection id.
    pub async fn list_peers(&self) -> Vec<PeerSummary> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::ListPeers { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to peer events.
    ///
    /// This is a synchronous operation - it doesn't communicate with the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

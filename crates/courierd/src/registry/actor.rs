//! Registry actor - owns the peer map and processes commands.
//!
//! The RegistryActor is the single owner of the identifier → connection
//! map. It receives commands via an mpsc channel and publishes events via
//! broadcast. Every command is handled to completion before the next one is
//! read, so the actor task is the registry's one mutual-exclusion domain.
//!
//! # Panic-Free Guarantees
//!
//! This module is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are ignored or logged, never panicked on
//!
//! No command handler performs network I/O; writes to peers happen in the
//! session loops on handles cloned out of the map.

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use courier_core::{ConnectionId, PeerId};

use super::commands::{PeerEvent, PeerSummary, RegistryCommand, RemovalReason};
use crate::peer::PeerConnection;

/// The registry actor - owns all peer state.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// One entry per connected peer identifier
    peers: HashMap<PeerId, PeerConnection>,

    /// Event publisher for registration/removal notifications
    event_publisher: broadcast::Sender<PeerEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<PeerEvent>,
    ) -> Self {
        Self {
            receiver,
            peers: HashMap::new(),
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    pub async fn run(mut self) {
        info!("Peer registry starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(peers = self.peers.len(), "Peer registry stopped");
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register {
                connection,
                respond_to,
            } => {
                let replaced = self.handle_register(connection);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(replaced);
            }
            RegistryCommand::Lookup {
                peer_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.peers.get(&peer_id).cloned());
            }
            RegistryCommand::Remove {
                peer_id,
                connection_id,
                respond_to,
            } => {
                let removed = self.handle_remove(peer_id, connection_id);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::PeerCount { respond_to } => {
                let _ = respond_to.send(self.peers.len());
            }
            RegistryCommand::ListPeers { respond_to } => {
                let _ = respond_to.send(self.handle_list_peers());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    /// Inserts or overwrites the entry for the connection's identifier.
    ///
    /// The superseded connection is not closed; it just stops being
    /// reachable through lookup.
    fn handle_register(&mut self, connection: PeerConnection) -> Option<ConnectionId> {
        let peer_id = connection.peer_id().clone();
        let connection_id = connection.id();
        let role = connection.role();

        let replaced = self
            .peers
            .insert(peer_id.clone(), connection)
            .map(|old| old.id());

        if let Some(old_id) = replaced {
            debug!(
                peer_id = %peer_id,
                old = %old_id,
                new = %connection_id,
                "Identifier re-registered, previous connection unreachable"
            );
            let _ = self.event_publisher.send(PeerEvent::Removed {
                peer_id: peer_id.clone(),
                connection_id: old_id,
                reason: RemovalReason::Replaced,
            });
        }

        info!(
            peer_id = %peer_id,
            connection = %connection_id,
            role = %role,
            total_peers = self.peers.len(),
            "Peer registered"
        );

        // Publish event (ignore if no subscribers)
        let _ = self.event_publisher.send(PeerEvent::Registered {
            peer_id,
            connection_id,
            role,
            replaced,
        });

        replaced
    }

    /// Compare-and-remove: only evicts the entry if it still belongs to
    /// `connection_id`.
    fn handle_remove(&mut self, peer_id: PeerId, connection_id: ConnectionId) -> bool {
        let owned = self
            .peers
            .get(&peer_id)
            .is_some_and(|current| current.id() == connection_id);

        if !owned {
            debug!(
                peer_id = %peer_id,
                connection = %connection_id,
                "Stale removal ignored"
            );
            return false;
        }

        self.peers.remove(&peer_id);

        info!(
            peer_id = %peer_id,
            connection = %connection_id,
            total_peers = self.peers.len(),
            "Peer removed"
        );

        let _ = self.event_publisher.send(PeerEvent::Removed {
            peer_id,
            connection_id,
            reason: RemovalReason::Disconnected,
        });

        true
    }

    fn handle_list_peers(&self) -> Vec<PeerSummary> {
        let mut peers: Vec<PeerSummary> = self
            .peers
            .values()
            .map(|conn| PeerSummary {
                peer_id: conn.peer_id().clone(),
                connection_id: conn.id(),
                role: conn.role(),
            })
            .collect();
        peers.sort_by_key(|p| p.connection_id);
        peers
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of peers currently registered.
    #[cfg(test)]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Role;
    use tokio::sync::oneshot;

    fn create_connection(conn: u64, id: &str) -> PeerConnection {
        let (connection, _rx) = PeerConnection::channel(
            ConnectionId::new(conn),
            PeerId::new(id).unwrap(),
            Role::User,
            4,
        );
        connection
    }

    fn create_actor() -> (
        mpsc::Sender<RegistryCommand>,
        RegistryActor,
        broadcast::Receiver<PeerEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(16);
        let actor = RegistryActor::new(cmd_rx, event_tx);
        (cmd_tx, actor, event_rx)
    }

    fn register(actor: &mut RegistryActor, connection: PeerConnection) {
        let (tx, _) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            connection,
            respond_to: tx,
        });
    }

    async fn lookup(actor: &mut RegistryActor, id: &str) -> Option<PeerConnection> {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Lookup {
            peer_id: PeerId::new(id).unwrap(),
            respond_to: tx,
        });
        rx.await.unwrap()
    }

    async fn remove(actor: &mut RegistryActor, id: &str, conn: u64) -> bool {
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Remove {
            peer_id: PeerId::new(id).unwrap(),
            connection_id: ConnectionId::new(conn),
            respond_to: tx,
        });
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_register_peer() {
        let (cmd_tx, mut actor, mut event_rx) = create_actor();
        let (respond_tx, respond_rx) = oneshot::channel();

        cmd_tx
            .send(RegistryCommand::Register {
                connection: create_connection(1, "u1"),
                respond_to: respond_tx,
            })
            .await
            .unwrap();

        // Process the command manually (actor not running in background)
        if let Some(cmd) = actor.receiver.recv().await {
            actor.handle_command(cmd);
        }

        assert_eq!(respond_rx.await.unwrap(), None);
        assert_eq!(actor.peer_count(), 1);

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(
            event,
            PeerEvent::Registered { replaced: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_register_overwrites_last_write_wins() {
        let (_, mut actor, mut event_rx) = create_actor();

        register(&mut actor, create_connection(1, "u1"));
        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::Register {
            connection: create_connection(2, "u1"),
            respond_to: tx,
        });

        assert_eq!(rx.await.unwrap(), Some(ConnectionId::new(1)));
        assert_eq!(actor.peer_count(), 1);

        let current = lookup(&mut actor, "u1").await.unwrap();
        assert_eq!(current.id(), ConnectionId::new(2));

        // Registered(1), Removed(1, Replaced), Registered(2)
        let _ = event_rx.try_recv().unwrap();
        let event = event_rx.try_recv().unwrap();
        assert!(matches!(
            event,
            PeerEvent::Removed {
                reason: RemovalReason::Replaced,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_lookup_missing_peer() {
        let (_, mut actor, _) = create_actor();
        assert!(lookup(&mut actor, "nobody").await.is_none());
    }

    #[tokio::test]
    async fn test_remove_own_registration() {
        let (_, mut actor, mut event_rx) = create_actor();
        register(&mut actor, create_connection(1, "d1"));
        let _ = event_rx.try_recv();

        assert!(remove(&mut actor, "d1", 1).await);
        assert_eq!(actor.peer_count(), 0);

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(
            event,
            PeerEvent::Removed {
                reason: RemovalReason::Disconnected,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stale_remove_keeps_newer_registration() {
        let (_, mut actor, _) = create_actor();

        register(&mut actor, create_connection(1, "u1"));
        register(&mut actor, create_connection(2, "u1"));

        assert!(!remove(&mut actor, "u1", 1).await);

        let current = lookup(&mut actor, "u1").await.unwrap();
        assert_eq!(current.id(), ConnectionId::new(2));
    }

    #[tokio::test]
    async fn test_remove_missing_peer() {
        let (_, mut actor, _) = create_actor();
        assert!(!remove(&mut actor, "ghost", 7).await);
    }

    #[tokio::test]
    async fn test_list_peers_sorted_by_connection() {
        let (_, mut actor, _) = create_actor();
        register(&mut actor, create_connection(3, "c"));
        register(&mut actor, create_connection(1, "a"));
        register(&mut actor, create_connection(2, "b"));

        let (tx, rx) = oneshot::channel();
        actor.handle_command(RegistryCommand::ListPeers { respond_to: tx });
        let peers = rx.await.unwrap();

        let ids: Vec<&str> = peers.iter().map(|p| p.peer_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}

//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `PeerEvent`: Events published by the registry for subscribers

use courier_core::{ConnectionId, PeerId, Role};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::peer::PeerConnection;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Register a connection under its peer identifier.
    ///
    /// Overwrites any existing entry for the same identifier. The response
    /// carries the id of the superseded connection, if there was one.
    Register {
        connection: PeerConnection,
        respond_to: oneshot::Sender<Option<ConnectionId>>,
    },

    /// Look up the connection currently registered under an identifier.
    Lookup {
        peer_id: PeerId,
        respond_to: oneshot::Sender<Option<PeerConnection>>,
    },

    /// Remove the entry for `peer_id`, but only if it still belongs to
    /// `connection_id`.
    ///
    /// Responds `true` if an entry was removed.
    Remove {
        peer_id: PeerId,
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<bool>,
    },

    /// Number of registered peers.
    PeerCount {
        respond_to: oneshot::Sender<usize>,
    },

    /// Summaries of all registered peers.
    ListPeers {
        respond_to: oneshot::Sender<Vec<PeerSummary>>,
    },
}

/// Read-only view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSummary {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
    pub role: Role,
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Peer Events
// ============================================================================

/// Events published by the registry to subscribers.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A connection was registered.
    Registered {
        peer_id: PeerId,
        connection_id: ConnectionId,
        role: Role,
        /// Connection that held the identifier before this one
        replaced: Option<ConnectionId>,
    },

    /// A connection's entry left the registry.
    Removed {
        peer_id: PeerId,
        connection_id: ConnectionId,
        reason: RemovalReason,
    },
}

/// Reason why an entry left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The owning session loop exited.
    Disconnected,

    /// A newer connection registered under the same identifier.
    Replaced,
}

impl std::fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "connection closed"),
            Self::Replaced => write!(f, "superseded by newer connection"),
        }
    }
}

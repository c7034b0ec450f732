//! Peer registry using Actor pattern.
//!
//! The registry maps each peer identifier to the connection currently
//! registered under it. It receives commands via a tokio mpsc channel and is
//! the only shared mutable state in the relay.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  PeerSession    │────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! │  (per socket)   │     └─────────────────┘     └──────────────────┘
//! └─────────────────┘             │                       │
//!         │   RegistryCommand     │   PeerEvent           │
//!         │   (mpsc channel)      │   (broadcast)         │
//!         ▼                       ▼                       ▼
//!    Register/Lookup        HashMap<PeerId,          subscribers
//!    Remove                 PeerConnection>
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{PeerEvent, PeerSummary, RegistryCommand, RegistryError, RemovalReason};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor runs until every `RegistryHandle` clone has been dropped.
///
/// # Example
///
/// ```no_run
/// use courierd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///     assert_eq!(registry.peer_count().await, 0);
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}

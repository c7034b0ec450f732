//! courier core - Shared types for the courier relay
//!
//! This crate provides the domain types shared between the relay
//! daemon (courierd) and anything that talks to it:
//! - `PeerId` / `ConnectionId` - identities used for routing
//! - `Role` / `ConnectParams` / `Identity` - connection classification
//! - `Frame` - the opaque unit forwarded between peers
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod frame;
pub mod params;
pub mod peer;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use frame::Frame;
pub use params::{ConnectParams, Identity};
pub use peer::{ConnectionId, PeerId, Role};

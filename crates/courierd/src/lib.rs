//! Courier relay - peer registry and WebSocket forwarding server
//!
//! This crate provides the core infrastructure for the courier relay:
//! - `config` - Layered relay configuration (defaults, TOML, env)
//! - `logging` - `RUST_LOG`-aware tracing subscriber setup
//! - `peer` - Write handle for one connected peer
//! - `registry` - Peer registry actor mapping identifiers to connections
//! - `server` - axum WebSocket server and per-connection session loop
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       courierd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │   RelayServer   │────▶│     RegistryActor           │   │
//! │  │  (axum + ws)    │     │  (identifier → connection)  │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │                   │
//! │           │ upgrades                    │ lookup            │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  PeerSession    │────▶│   PeerConnection            │   │
//! │  │  (per socket)   │     │   (counterpart's sink)      │   │
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod logging;
pub mod peer;
pub mod registry;
pub mod server;

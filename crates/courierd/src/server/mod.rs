//! WebSocket server for the courier relay.
//!
//! The server:
//! - Accepts HTTP upgrade requests on the configured path
//! - Classifies each request as a user or delivery agent connection
//! - Spawns a `PeerSession` for each upgraded socket
//! - Serves a small `/health` endpoint
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   axum Router   │
//! └───────┬─────────┘
//!         │ on_upgrade()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   PeerSession   │────▶│  RegistryHandle │
//! │   (per socket)  │     │                 │
//! └────────┬────────┘     └─────────────────┘
//!          │ lookup(counterpart)
//!          ▼
//! ┌─────────────────┐
//! │ PeerConnection  │
//! │ (counterpart)   │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A failed or rejected upgrade only affects its own request

mod connection;

pub use connection::{message_from_frame, PeerSession, SessionEnd};
pub use crate::peer::{ConnectionError, PeerConnection};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::{future, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::{ConnectParams, ConnectionId, Frame, Identity};

use crate::config::RelayConfig;
use crate::registry::RegistryHandle;

/// Shared state handed to every request.
#[derive(Clone)]
struct RelayState {
    registry: RegistryHandle,
    connection_counter: Arc<AtomicU64>,
    cancel_token: CancellationToken,
    max_frame_size: usize,
    write_timeout: Duration,
    idle_timeout: Option<Duration>,
}

/// WebSocket relay server.
pub struct RelayServer {
    config: RelayConfig,

    /// Handle to the peer registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection ids
    connection_counter: Arc<AtomicU64>,
}

impl RelayServer {
    /// Creates a new relay server.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address, endpoint path and per-connection limits
    /// * `registry` - Handle to the peer registry
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(config: RelayConfig, registry: RegistryHandle, cancel_token: CancellationToken) -> Self {
        Self {
            config,
            registry,
            cancel_token,
            connection_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Builds the HTTP router: the upgrade endpoint plus `/health`.
    pub fn router(&self) -> Router {
        let state = RelayState {
            registry: self.registry.clone(),
            connection_counter: Arc::clone(&self.connection_counter),
            cancel_token: self.cancel_token.clone(),
            max_frame_size: self.config.max_frame_size,
            write_timeout: self.config.write_timeout(),
            idle_timeout: self.config.idle_timeout(),
        };

        Router::new()
            .route(&self.config.path, get(upgrade_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }

    /// Binds the configured address and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;

        self.serve(listener).await
    }

    /// Serves on an already-bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().map_err(|e| ServerError::Serve(e.to_string()))?;

        info!(
            addr = %local_addr,
            path = %self.config.path,
            "Relay server listening"
        );

        let shutdown = self.cancel_token.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("Server shutdown requested");
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("Relay server stopped");
        Ok(())
    }
}

/// `GET {path}?user_id=..&delivery_id=..[&role=..]`
///
/// Identification happens before the upgrade, so a request carrying no
/// identifier is answered with `400 Bad Request` and never reaches the
/// registry.
async fn upgrade_handler(
    State(state): State<RelayState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = match params.classify() {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Rejecting connection");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let connection_id = ConnectionId::new(state.connection_counter.fetch_add(1, Ordering::Relaxed));
    debug!(
        connection = %connection_id,
        peer_id = %identity.peer_id,
        role = %identity.role,
        "Upgrading connection"
    );

    ws.max_message_size(state.max_frame_size)
        .on_failed_upgrade(move |e| {
            warn!(connection = %connection_id, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| handle_socket(socket, identity, connection_id, state))
}

/// Runs one upgraded socket through its session.
async fn handle_socket(socket: WebSocket, identity: Identity, connection_id: ConnectionId, state: RelayState) {
    let (sink, stream) = socket.split();

    let sink = sink
        .sink_map_err(|e| ConnectionError::Io(e.to_string()))
        .with(|frame: Frame| future::ready(Ok::<_, ConnectionError>(message_from_frame(frame))));

    let connection = PeerConnection::new(
        connection_id,
        identity.peer_id,
        identity.role,
        sink,
        state.write_timeout,
    );

    PeerSession::new(
        connection,
        identity.counterpart,
        stream,
        state.registry,
        state.cancel_token,
    )
    .with_idle_timeout(state.idle_timeout)
    .run()
    .await;
}

/// `GET /health`
async fn health_handler(State(state): State<RelayState>) -> Json<serde_json::Value> {
    let peers = state.registry.peer_count().await;
    Json(serde_json::json!({
        "status": "ok",
        "peers": peers,
    }))
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Server error: {0}")]
    Serve(String),
}

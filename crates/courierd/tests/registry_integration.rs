//! Integration tests for the peer registry.
//!
//! These tests drive a spawned registry actor through its handle, the way
//! session loops do, using channel-backed peer connections.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::time::Duration;

use courier_core::{ConnectionId, Frame, PeerId, Role};
use courierd::peer::PeerConnection;
use courierd::registry::{spawn_registry, PeerEvent, RegistryHandle, RemovalReason};
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::time::timeout;

// ============================================================================
// Test Helpers
// ============================================================================

const EVENT_TIMEOUT: Duration = Duration::from_secs(1);

fn peer(id: &str) -> PeerId {
    PeerId::new(id).expect("valid peer id")
}

fn connection(conn: u64, id: &str, role: Role) -> (PeerConnection, mpsc::Receiver<Frame>) {
    PeerConnection::channel(ConnectionId::new(conn), peer(id), role, 16)
}

async fn next_event(events: &mut tokio::sync::broadcast::Receiver<PeerEvent>) -> PeerEvent {
    timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("event timeout")
        .expect("event channel")
}

async fn registered_id(registry: &RegistryHandle, id: &str) -> Option<ConnectionId> {
    registry.lookup(&peer(id)).await.map(|c| c.id())
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_lookup_and_send() {
    let registry = spawn_registry();
    let (conn, mut outbound) = connection(1, "d-7", Role::Delivery);

    assert_eq!(registry.register(conn).await.unwrap(), None);

    let target = registry.lookup(&peer("d-7")).await.expect("registered");
    assert_eq!(target.role(), Role::Delivery);

    target.send_frame(Frame::text("where are you?")).await.unwrap();
    assert_eq!(outbound.next().await, Some(Frame::text("where are you?")));
}

#[tokio::test]
async fn test_user_and_delivery_share_one_namespace() {
    let registry = spawn_registry();
    let (user, _u) = connection(1, "same", Role::User);
    let (delivery, _d) = connection(2, "same", Role::Delivery);

    registry.register(user).await.unwrap();
    let replaced = registry.register(delivery).await.unwrap();

    assert_eq!(replaced, Some(ConnectionId::new(1)));
    let current = registry.lookup(&peer("same")).await.unwrap();
    assert_eq!(current.role(), Role::Delivery);
    assert_eq!(registry.peer_count().await, 1);
}

#[tokio::test]
async fn test_last_registration_wins() {
    let registry = spawn_registry();
    let (first, mut first_rx) = connection(1, "u-1", Role::User);
    let (second, mut second_rx) = connection(2, "u-1", Role::User);

    registry.register(first).await.unwrap();
    registry.register(second).await.unwrap();

    let target = registry.lookup(&peer("u-1")).await.unwrap();
    target.send_frame(Frame::text("hi")).await.unwrap();

    assert_eq!(second_rx.next().await, Some(Frame::text("hi")));
    // The superseded connection receives nothing
    assert!(!matches!(first_rx.try_next(), Ok(Some(_))));
}

// ============================================================================
// Removal
// ============================================================================

#[tokio::test]
async fn test_guarded_removal() {
    let registry = spawn_registry();
    let (first, _a) = connection(1, "u-1", Role::User);
    let (second, _b) = connection(2, "u-1", Role::User);

    registry.register(first).await.unwrap();
    registry.register(second).await.unwrap();

    // The older connection exiting must not evict the newer one
    assert!(!registry.remove(peer("u-1"), ConnectionId::new(1)).await.unwrap());
    assert_eq!(registered_id(&registry, "u-1").await, Some(ConnectionId::new(2)));

    assert!(registry.remove(peer("u-1"), ConnectionId::new(2)).await.unwrap());
    assert_eq!(registered_id(&registry, "u-1").await, None);
}

#[tokio::test]
async fn test_removal_of_unknown_identifier_is_noop() {
    let registry = spawn_registry();
    assert!(!registry.remove(peer("ghost"), ConnectionId::new(9)).await.unwrap());
    assert_eq!(registry.peer_count().await, 0);
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_describe_replacement() {
    let registry = spawn_registry();
    let mut events = registry.subscribe();

    let (first, _a) = connection(1, "d-1", Role::Delivery);
    let (second, _b) = connection(2, "d-1", Role::Delivery);
    registry.register(first).await.unwrap();
    registry.register(second).await.unwrap();
    registry.remove(peer("d-1"), ConnectionId::new(2)).await.unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        PeerEvent::Registered { replaced: None, .. }
    ));
    match next_event(&mut events).await {
        PeerEvent::Removed {
            connection_id,
            reason,
            ..
        } => {
            assert_eq!(connection_id, ConnectionId::new(1));
            assert_eq!(reason, RemovalReason::Replaced);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        next_event(&mut events).await,
        PeerEvent::Registered {
            replaced: Some(_),
            ..
        }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        PeerEvent::Removed {
            reason: RemovalReason::Disconnected,
            ..
        }
    ));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_and_remove() {
    let registry = spawn_registry();

    let mut tasks = Vec::new();
    for n in 0..100u64 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let id = format!("peer-{n}");
            let (conn, _rx) = connection(n, &id, Role::User);
            registry.register(conn).await.unwrap();

            // Odd peers disconnect again
            if n % 2 == 1 {
                assert!(registry.remove(peer(&id), ConnectionId::new(n)).await.unwrap());
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(registry.peer_count().await, 50);

    let peers = registry.list_peers().await;
    assert_eq!(peers.len(), 50);
    assert!(peers.iter().all(|p| p.connection_id.get() % 2 == 0));
    assert!(peers.windows(2).all(|w| w[0].connection_id < w[1].connection_id));
    for summary in &peers {
        assert_eq!(
            summary.peer_id.as_str(),
            format!("peer-{}", summary.connection_id.get())
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_resolve_correct_mappings() {
    const PEERS: u64 = 100;
    let registry = spawn_registry();

    let mut registrations = Vec::new();
    for n in 0..PEERS {
        let registry = registry.clone();
        registrations.push(tokio::spawn(async move {
            let role = if n % 2 == 0 { Role::User } else { Role::Delivery };
            let (conn, rx) = connection(n, &format!("peer-{n}"), role);
            registry.register(conn).await.unwrap();
            rx
        }));
    }

    // Keep receivers alive so every handle stays writable
    let mut receivers = Vec::new();
    for task in registrations {
        receivers.push(task.await.unwrap());
    }
    assert_eq!(registry.peer_count().await, PEERS as usize);

    let mut lookups = Vec::new();
    for n in 0..PEERS {
        let registry = registry.clone();
        lookups.push(tokio::spawn(async move {
            let id = format!("peer-{n}");
            let found = registry.lookup(&peer(&id)).await.expect("registered");

            assert_eq!(found.id(), ConnectionId::new(n));
            assert_eq!(found.peer_id().as_str(), id);
            found
                .send_frame(Frame::text(format!("to {id}")))
                .await
                .unwrap();
        }));
    }
    for task in lookups {
        task.await.unwrap();
    }

    // Each frame landed on the connection registered under its identifier
    for (n, rx) in receivers.iter_mut().enumerate() {
        assert_eq!(rx.next().await, Some(Frame::text(format!("to peer-{n}"))));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reconnects_clean_up() {
    let registry = spawn_registry();

    let mut tasks = Vec::new();
    for n in 0..50u64 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let (conn, _rx) = connection(n, "busy", Role::Delivery);
            registry.register(conn).await.unwrap();
            // Every connection tries to clean up after itself
            registry.remove(peer("busy"), ConnectionId::new(n)).await.unwrap()
        }));
    }

    let mut removed = 0;
    for task in tasks {
        if task.await.unwrap() {
            removed += 1;
        }
    }

    // The last registrant always owns the entry when it removes it
    assert_eq!(registry.peer_count().await, 0);
    assert!(removed >= 1);
}

#[tokio::test]
async fn test_spawned_registry_starts_empty() {
    let registry = spawn_registry();
    assert!(registry.is_connected());
    assert_eq!(registry.peer_count().await, 0);
}

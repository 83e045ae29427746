use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::support::{connected_transport, fast_policy};
use crate::{
    ConnectionState, MemoryBroker, Publisher, PublisherConfig, QueueError, ReconnectPolicy,
    Transport,
};

async fn wait_for_state(transport: &Transport, wanted: ConnectionState) -> bool {
    for _ in 0..100 {
        if transport.state() == wanted {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_connect_reaches_connected_state() {
    let broker = MemoryBroker::new();
    let transport = Transport::new("test", Arc::new(broker.clone()), fast_policy());
    assert_eq!(transport.state(), ConnectionState::Disconnected);
    assert!(matches!(transport.lease().await, Err(QueueError::ConnectionLost)));

    transport.connect().await.unwrap();
    assert_eq!(transport.state(), ConnectionState::Connected);
    assert_eq!(transport.lease().await.unwrap().generation(), 1);

    // Connecting again is a no-op
    transport.connect().await.unwrap();
    assert_eq!(broker.connection_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_max_attempts() {
    let broker = MemoryBroker::new();
    broker.set_reachable(false);
    let policy = ReconnectPolicy::new(3, Duration::from_secs(1));
    let transport = Transport::new("test", Arc::new(broker.clone()), policy);

    let started = tokio::time::Instant::now();
    let err = transport.connect().await.unwrap_err();

    assert!(matches!(err, QueueError::Connection { attempts: 3, .. }));
    // Waits between attempts only, not before the first one
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(transport.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_close_is_terminal() {
    let broker = MemoryBroker::new();
    let transport = connected_transport(&broker).await;

    transport.close().await.unwrap();
    assert_eq!(transport.state(), ConnectionState::Closed);
    assert!(matches!(transport.lease().await, Err(QueueError::Closed)));
    assert!(matches!(transport.close().await, Err(QueueError::Closed)));
    assert!(matches!(transport.connect().await, Err(QueueError::Closed)));
}

#[tokio::test]
async fn test_recover_replaces_severed_connection() {
    let broker = MemoryBroker::new();
    let transport = connected_transport(&broker).await;
    let lease = transport.lease().await.unwrap();

    broker.sever_connections();
    let err = lease.connection().declare("q").await.unwrap_err();
    assert!(err.is_connection_failure());

    let recovered = transport.recover(&lease, fast_policy()).await.unwrap();
    assert_eq!(recovered.generation(), lease.generation() + 1);
    assert_eq!(transport.state(), ConnectionState::Connected);
    recovered.connection().declare("q").await.unwrap();
}

#[tokio::test]
async fn test_concurrent_recovers_dial_once() {
    let broker = MemoryBroker::new();
    let transport = connected_transport(&broker).await;
    let lease = transport.lease().await.unwrap();
    broker.sever_connections();

    let (a, b, c) = tokio::join!(
        transport.recover(&lease, fast_policy()),
        transport.recover(&lease, fast_policy()),
        transport.recover(&lease, fast_policy()),
    );

    let generations = [
        a.unwrap().generation(),
        b.unwrap().generation(),
        c.unwrap().generation(),
    ];
    assert!(generations.iter().all(|g| *g == 2));
    assert_eq!(broker.connection_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_reconnect_fails_until_fresh_connect() {
    let broker = MemoryBroker::new();
    let transport = connected_transport(&broker).await;
    let lease = transport.lease().await.unwrap();

    broker.set_reachable(false);
    broker.sever_connections();

    let err = transport.recover(&lease, fast_policy()).await.unwrap_err();
    assert_eq!(err, QueueError::ConnectionLost);
    assert_eq!(transport.state(), ConnectionState::Failed);
    assert!(matches!(transport.lease().await, Err(QueueError::ConnectionLost)));

    // Still failed even once the broker is back
    broker.set_reachable(true);
    assert_eq!(
        transport.recover(&lease, fast_policy()).await.unwrap_err(),
        QueueError::ConnectionLost
    );

    transport.connect().await.unwrap();
    assert_eq!(transport.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_close_interrupts_reconnect() {
    let broker = MemoryBroker::new();
    let transport = connected_transport(&broker).await;
    let lease = transport.lease().await.unwrap();
    broker.set_reachable(false);
    broker.sever_connections();

    let recovering = {
        let transport = transport.clone();
        let policy = ReconnectPolicy::new(10, Duration::from_secs(1));
        tokio::spawn(async move { transport.recover(&lease, policy).await })
    };

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(transport.state(), ConnectionState::Reconnecting);
    transport.close().await.unwrap();

    let result = recovering.await.unwrap();
    assert!(matches!(result, Err(QueueError::Closed)));
    assert_eq!(transport.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_restores_connection_after_long_outage() {
    let broker = MemoryBroker::new();
    let transport = connected_transport(&broker).await;
    let publisher = Publisher::new(transport.clone(), PublisherConfig::default());
    publisher.declare_destination("q").await.unwrap();

    let cancel = CancellationToken::new();
    let supervisor = transport.spawn_supervisor(cancel.clone());

    let lease = transport.lease().await.unwrap();
    broker.set_reachable(false);
    broker.sever_connections();
    transport.recover(&lease, fast_policy()).await.unwrap_err();

    // The outage outlasts several full reconnect budgets
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_ne!(transport.state(), ConnectionState::Connected);
    let err = publisher
        .publish(&CancellationToken::new(), "q", b"during")
        .await
        .unwrap_err();
    assert!(err.is_connection_failure());

    broker.set_reachable(true);
    assert!(wait_for_state(&transport, ConnectionState::Connected).await);
    publisher
        .publish(&CancellationToken::new(), "q", b"after")
        .await
        .unwrap();
    assert_eq!(broker.peek("q"), vec![b"after".to_vec()]);

    cancel.cancel();
    supervisor.await.unwrap();
}

#[tokio::test]
async fn test_supervisor_stops_when_transport_closes() {
    let broker = MemoryBroker::new();
    let transport = connected_transport(&broker).await;
    let supervisor = transport.spawn_supervisor(CancellationToken::new());

    transport.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), supervisor)
        .await
        .unwrap()
        .unwrap();
}

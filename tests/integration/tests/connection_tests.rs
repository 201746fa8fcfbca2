//! Connection manager integration tests
//!
//! Each test runs an in-process danmaku server on 127.0.0.1; no external
//! services are needed.
//!
//! Run with: cargo test -p integration-tests --test connection_tests

use std::time::Duration;

use danmaku_client::{ClientError, ClientEvent, ConnectionManager, ConnectionState};
use danmaku_core::{DomainEvent, RoomId};
use integration_tests::*;

// ============================================================================
// Handshake and delivery
// ============================================================================

#[tokio::test]
async fn test_connect_sends_auth_packet() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let tokens = MockTokens::new(server.addr());
    let (manager, mut events) = ConnectionManager::builder(tokens.clone())
        .config(test_config())
        .build();

    manager.connect(RoomId::new(21)).await.unwrap();
    let conn = server.next_connection().await;

    assert_eq!(conn.auth["roomid"], 21);
    assert_eq!(conn.auth["uid"], 0);
    assert_eq!(conn.auth["protover"], 3);
    assert_eq!(conn.auth["platform"], "web");
    assert_eq!(conn.auth["type"], 2);
    assert_eq!(conn.auth["key"], TEST_TOKEN);
    assert!(conn.auth["client_timestamp"].as_i64().unwrap() > 1_600_000_000);

    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::StateChanged {
            room_id: RoomId::new(21),
            state: ConnectionState::Connecting
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::StateChanged {
            room_id: RoomId::new(21),
            state: ConnectionState::Authenticated
        }
    );
    assert_eq!(manager.state(), ConnectionState::Authenticated);
    assert_eq!(manager.current_room(), Some(RoomId::new(21)));
    assert_eq!(tokens.calls(), 1);
}

#[tokio::test]
async fn test_events_are_delivered_in_order() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let (manager, mut events) = ConnectionManager::builder(MockTokens::new(server.addr()))
        .config(test_config())
        .build();

    manager.connect(RoomId::new(1)).await.unwrap();
    let conn = server.next_connection().await;

    conn.send(notification(&chat_command("Alice", "hello")));
    conn.send(brotli_batch(&[
        body(&gift_command("Bob", "辣条", 3)),
        b"{not json".to_vec(),
        body(&super_chat_command("Carol", "加油", 30)),
    ]));
    conn.send(zlib_batch(&[body(&chat_command("Dave", "bye"))]));

    let (room, first) = next_domain(&mut events).await;
    assert_eq!(room, RoomId::new(1));
    let DomainEvent::Chat(chat) = first else {
        panic!("expected chat, got {first:?}");
    };
    assert_eq!(chat.user_name, "Alice");
    assert_eq!(chat.content, "hello");
    assert_eq!(chat.color.as_deref(), Some("#FFFFFF"));

    let (_, second) = next_domain(&mut events).await;
    let DomainEvent::Gift(gift) = second else {
        panic!("expected gift, got {second:?}");
    };
    assert_eq!(gift.gift_name, "辣条");
    assert_eq!(gift.count, 3);

    let (_, third) = next_domain(&mut events).await;
    assert!(third.is_paid());
    assert_eq!(third.user_name(), "Carol");

    let (_, fourth) = next_domain(&mut events).await;
    assert_eq!(fourth.content(), "bye");
}

#[tokio::test]
async fn test_heartbeats_yield_popularity() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let (manager, mut events) = ConnectionManager::builder(MockTokens::new(server.addr()))
        .config(test_config())
        .build();

    manager.connect(RoomId::new(8)).await.unwrap();
    let conn = server.next_connection().await;

    loop {
        if let ClientEvent::Popularity { room_id, count } = next_event(&mut events).await {
            assert_eq!(room_id, RoomId::new(8));
            assert_eq!(count, POPULARITY);
            break;
        }
    }
    assert!(conn.heartbeats() >= 1);
}

#[tokio::test]
async fn test_zero_heartbeat_interval_still_beats() {
    let mut server = MockDanmakuServer::start_with(ServerBehavior {
        reply_heartbeats: false,
        ..ServerBehavior::default()
    })
    .await
    .unwrap();
    let mut config = test_config();
    config.heartbeat_interval = Duration::ZERO;
    let (manager, _events) = ConnectionManager::builder(MockTokens::new(server.addr()))
        .config(config)
        .build();

    manager.connect(RoomId::new(12)).await.unwrap();
    let conn = server.next_connection().await;

    tokio::time::timeout(WAIT, async {
        while conn.heartbeats() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no heartbeats with a zero interval");
    assert_eq!(manager.state(), ConnectionState::Authenticated);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_auth_rejected_is_not_retried() {
    let mut server = MockDanmakuServer::start_with(ServerBehavior {
        reject_auth: true,
        ..ServerBehavior::default()
    })
    .await
    .unwrap();
    let tokens = MockTokens::new(server.addr());
    let (manager, _events) = ConnectionManager::builder(tokens.clone())
        .config(test_config())
        .build();

    let err = manager.connect(RoomId::new(5)).await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationFailed { .. }));
    assert!(err.is_operator_visible());
    assert_eq!(manager.state(), ConnectionState::Failed);

    let _conn = server.next_connection().await;
    server.assert_no_connection(Duration::from_millis(200)).await;
    assert_eq!(tokens.calls(), 1);
}

#[tokio::test]
async fn test_reconnect_after_server_close() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let tokens = MockTokens::new(server.addr());
    let (manager, mut events) = ConnectionManager::builder(tokens.clone())
        .config(test_config())
        .build();

    manager.connect(RoomId::new(3)).await.unwrap();
    let first = server.next_connection().await;
    first.close();

    wait_for_state(&mut events, ConnectionState::Reconnecting).await;
    let second = server.next_connection().await;
    wait_for_state(&mut events, ConnectionState::Authenticated).await;
    assert_eq!(tokens.calls(), 2);

    second.send(notification(&chat_command("Eve", "back")));
    let (room, event) = next_domain(&mut events).await;
    assert_eq!(room, RoomId::new(3));
    assert_eq!(event.content(), "back");
}

#[tokio::test]
async fn test_liveness_timeout_reconnects() {
    let mut server = MockDanmakuServer::start_with(ServerBehavior {
        reply_heartbeats: false,
        ..ServerBehavior::default()
    })
    .await
    .unwrap();
    let mut config = test_config();
    config.heartbeat_interval = Duration::from_millis(50);
    config.liveness_timeout = Duration::from_millis(200);
    let (manager, mut events) = ConnectionManager::builder(MockTokens::new(server.addr()))
        .config(config)
        .build();

    manager.connect(RoomId::new(4)).await.unwrap();
    let first = server.next_connection().await;

    wait_for_state(&mut events, ConnectionState::Reconnecting).await;
    let _second = server.next_connection().await;
    first.closed().await;
}

#[tokio::test]
async fn test_reconnect_gives_up_after_cap() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let tokens = MockTokens::failing_after(server.addr(), 1);
    let (manager, mut events) = ConnectionManager::builder(tokens.clone())
        .config(test_config())
        .build();

    manager.connect(RoomId::new(6)).await.unwrap();
    let conn = server.next_connection().await;
    conn.drop_connection();

    wait_for_state(&mut events, ConnectionState::Failed).await;
    assert_eq!(tokens.calls(), 1 + 5);
    assert_eq!(manager.state(), ConnectionState::Failed);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(tokens.calls(), 1 + 5);
}

// ============================================================================
// Disconnect and room switching
// ============================================================================

#[tokio::test]
async fn test_disconnect_closes_without_reconnect() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let tokens = MockTokens::new(server.addr());
    let (manager, mut events) = ConnectionManager::builder(tokens.clone())
        .config(test_config())
        .build();

    manager.connect(RoomId::new(9)).await.unwrap();
    let conn = server.next_connection().await;
    wait_for_state(&mut events, ConnectionState::Authenticated).await;

    manager.disconnect(RoomId::new(9)).await;
    conn.closed().await;

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.current_room(), None);
    server.assert_no_connection(Duration::from_millis(200)).await;
    assert_eq!(tokens.calls(), 1);

    let states: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::StateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        [ConnectionState::Disconnecting, ConnectionState::Disconnected]
    );
}

#[tokio::test]
async fn test_disconnect_during_reconnect_completes() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let tokens = MockTokens::hanging_after(server.addr(), 1);
    let (manager, mut events) = ConnectionManager::builder(tokens.clone())
        .config(test_config())
        .build();

    manager.connect(RoomId::new(10)).await.unwrap();
    let conn = server.next_connection().await;
    conn.drop_connection();

    wait_for_state(&mut events, ConnectionState::Reconnecting).await;
    // reconnect holds the connect lock while its token fetch hangs
    tokio::time::timeout(WAIT, async {
        while tokens.calls() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("reconnect never fetched a token");

    tokio::time::timeout(WAIT, manager.disconnect(RoomId::new(10)))
        .await
        .expect("disconnect blocked behind reconnect");

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.current_room(), None);
    server.assert_no_connection(Duration::from_millis(200)).await;
    assert_eq!(tokens.calls(), 2);
}

#[tokio::test]
async fn test_switching_rooms_replaces_connection() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let tokens = MockTokens::new(server.addr());
    let (manager, mut events) = ConnectionManager::builder(tokens.clone())
        .config(test_config())
        .build();

    manager.connect(RoomId::new(1)).await.unwrap();
    let old = server.next_connection().await;

    manager.connect(RoomId::new(2)).await.unwrap();
    let new = server.next_connection().await;
    assert_eq!(new.auth["roomid"], 2);
    old.closed().await;

    new.send(notification(&chat_command("Frank", "room two")));
    let (room, event) = next_domain(&mut events).await;
    assert_eq!(room, RoomId::new(2));
    assert_eq!(event.content(), "room two");

    assert_eq!(manager.current_room(), Some(RoomId::new(2)));
    server.assert_no_connection(Duration::from_millis(200)).await;
    assert_eq!(tokens.calls(), 2);
}

#[tokio::test]
async fn test_disconnect_other_room_keeps_connection() {
    let mut server = MockDanmakuServer::start().await.unwrap();
    let (manager, _events) = ConnectionManager::builder(MockTokens::new(server.addr()))
        .config(test_config())
        .build();

    manager.connect(RoomId::new(1)).await.unwrap();
    let conn = server.next_connection().await;

    manager.disconnect(RoomId::new(99)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!conn.is_closed());
    assert_eq!(manager.state(), ConnectionState::Authenticated);
    assert_eq!(manager.current_room(), Some(RoomId::new(1)));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn test_settings() -> HubSettings {
    HubSettings {
        queue_depth: 8,
        ping_interval: Duration::from_secs(30),
        pong_timeout: Duration::from_secs(10),
        write_timeout: Duration::from_secs(10),
        max_frame_bytes: 512 * 1024,
    }
}

fn click() -> Action {
    Action::Click {
        selector: Some("#go".to_owned()),
        coordinates: None,
        button: None,
        modifiers: None,
    }
}

fn ok_response(id: u64) -> CommandResponse {
    CommandResponse {
        id,
        success: true,
        result: Some(serde_json::json!({"clicked": true})),
        error: None,
        timing: None,
    }
}

/// Pull the next command frame off a session's outbound queue.
async fn next_command(rx: &mut tokio::sync::mpsc::Receiver<ServerFrame>) -> (u64, String) {
    loop {
        match rx.recv().await.expect("outbound queue should stay open") {
            ServerFrame::Command { id, tab_id, .. } => return (id, tab_id),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn send_command_without_session_is_offline() {
    let hub = Hub::new(test_settings());
    let err = hub
        .send_command("d1", "t1".to_owned(), click(), Duration::from_secs(1))
        .await
        .expect_err("no session registered");
    assert_eq!(err, RelayError::ExtensionOffline);
}

#[tokio::test]
async fn command_round_trips_through_pending_table() {
    let hub = Arc::new(Hub::new(test_settings()));
    let (_session, mut rx) = hub.register("d1", "agent", None).await;

    let responder = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            let (id, tab_id) = next_command(&mut rx).await;
            assert_eq!(tab_id, "t1");
            hub.handle_response(ok_response(id));
        })
    };

    let resp = hub
        .send_command("d1", "t1".to_owned(), click(), Duration::from_secs(2))
        .await
        .expect("command should resolve");
    assert!(resp.success);
    responder.await.expect("responder task");
    assert_eq!(hub.pending_len(), 0);
}

#[tokio::test]
async fn command_times_out_and_pending_table_empties() {
    let hub = Hub::new(test_settings());
    let (_session, _rx) = hub.register("d1", "agent", None).await;

    let start = tokio::time::Instant::now();
    let err = hub
        .send_command("d1", "t1".to_owned(), click(), Duration::from_millis(100))
        .await
        .expect_err("extension never replies");
    assert_eq!(err, RelayError::Timeout);
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(hub.pending_len(), 0);
}

#[tokio::test]
async fn late_response_after_timeout_is_dropped() {
    let hub = Hub::new(test_settings());
    let (_session, mut rx) = hub.register("d1", "agent", None).await;

    let err = hub
        .send_command("d1", "t1".to_owned(), click(), Duration::from_millis(50))
        .await
        .expect_err("times out");
    assert_eq!(err, RelayError::Timeout);

    let (id, _) = next_command(&mut rx).await;
    // The entry is gone; resolving now is a no-op.
    hub.handle_response(ok_response(id));
    assert_eq!(hub.pending_len(), 0);
}

#[tokio::test]
async fn session_death_resolves_pending_with_offline() {
    let hub = Arc::new(Hub::new(test_settings()));
    let (session, _rx) = hub.register("d1", "agent", None).await;

    let dispatch = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            hub.send_command("d1", "t1".to_owned(), click(), Duration::from_secs(10)).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    hub.unregister(&session).await;

    let err = dispatch.await.expect("dispatch task").expect_err("session died");
    assert_eq!(err, RelayError::ExtensionOffline);
    assert_eq!(hub.pending_len(), 0);
}

#[tokio::test]
async fn takeover_replaces_session_and_cancels_old() {
    let hub = Hub::new(test_settings());
    let (old, _old_rx) = hub.register("d1", "agent", None).await;
    assert!(!old.done.is_cancelled());

    let (new, _new_rx) = hub.register("d1", "agent", None).await;
    assert!(old.done.is_cancelled());
    assert!(!new.done.is_cancelled());

    // The old session's tear-down must not evict its replacement.
    hub.unregister(&old).await;
    let current = hub.session("d1").await.expect("replacement still registered");
    assert!(Arc::ptr_eq(&current, &new));
    assert_eq!(hub.session_count().await, 1);
}

#[tokio::test]
async fn at_most_one_session_per_digest() {
    let hub = Hub::new(test_settings());
    let (_a, _rx_a) = hub.register("d1", "agent", None).await;
    let (_b, _rx_b) = hub.register("d1", "agent", None).await;
    assert_eq!(hub.session_count().await, 1);
}

#[tokio::test]
async fn full_queue_surfaces_backpressure() {
    let mut settings = test_settings();
    settings.queue_depth = 1;
    let hub = Hub::new(settings);
    let (session, _rx) = hub.register("d1", "agent", None).await;

    // Fill the queue without a consumer.
    session
        .enqueue(ServerFrame::Ping { timestamp: 0 })
        .expect("first frame fits");

    let err = hub
        .send_command("d1", "t1".to_owned(), click(), Duration::from_secs(1))
        .await
        .expect_err("queue is full");
    assert_eq!(err, RelayError::Backpressured);
    assert_eq!(hub.pending_len(), 0);
}

#[tokio::test]
async fn concurrent_commands_demultiplex_out_of_order() {
    let hub = Arc::new(Hub::new(test_settings()));
    let (_session, mut rx) = hub.register("d1", "agent", None).await;

    let first = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            hub.send_command("d1", "t1".to_owned(), click(), Duration::from_secs(2)).await
        })
    };
    let second = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            hub.send_command("d1", "t2".to_owned(), click(), Duration::from_secs(2)).await
        })
    };

    let (id_a, tab_a) = next_command(&mut rx).await;
    let (id_b, tab_b) = next_command(&mut rx).await;

    // Reply in reverse order, with results naming the tab they answer.
    hub.handle_response(CommandResponse {
        id: id_b,
        success: true,
        result: Some(serde_json::json!({"tab": tab_b})),
        error: None,
        timing: None,
    });
    hub.handle_response(CommandResponse {
        id: id_a,
        success: true,
        result: Some(serde_json::json!({"tab": tab_a})),
        error: None,
        timing: None,
    });

    let resp_a = first.await.expect("task").expect("response");
    let resp_b = second.await.expect("task").expect("response");
    assert_eq!(resp_a.result, Some(serde_json::json!({"tab": "t1"})));
    assert_eq!(resp_b.result, Some(serde_json::json!({"tab": "t2"})));
}

#[tokio::test]
async fn drain_returns_once_pending_is_empty() {
    let hub = Arc::new(Hub::new(test_settings()));
    let (_session, mut rx) = hub.register("d1", "agent", None).await;

    let dispatch = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            hub.send_command("d1", "t1".to_owned(), click(), Duration::from_secs(5)).await
        })
    };

    let (id, _) = next_command(&mut rx).await;
    assert_eq!(hub.pending_len(), 1);

    hub.handle_response(ok_response(id));
    hub.drain(Duration::from_secs(2)).await;
    assert_eq!(hub.pending_len(), 0);
    dispatch.await.expect("task").expect("response");
}

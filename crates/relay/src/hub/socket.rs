// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session socket pumps: handshake, heartbeats, read/write loops.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::protocol::{ExtensionFrame, ServerFrame};
use crate::state::{epoch_ms, RelayState};
use crate::store::ValidatedToken;
use super::session::{Session, SessionState, Tab};

/// Drive one extension socket for its whole life: register (taking over
/// any previous session on the same digest), ack the handshake, run both
/// pumps, and unregister when either side gives up.
pub async fn serve_session(
    state: Arc<RelayState>,
    mut socket: WebSocket,
    token: ValidatedToken,
    extension_version: Option<String>,
) {
    let hub = &state.hub;
    let (session, outbound_rx) =
        hub.register(&token.digest, &token.name, extension_version).await;
    tracing::info!(
        session_id = %session.id,
        token = %token.name,
        "extension connected"
    );

    let ack = ServerFrame::HandshakeAck {
        session_id: session.id.clone(),
        server_time: epoch_ms(),
        server_version: env!("CARGO_PKG_VERSION").to_owned(),
    };
    if send_frame(&mut socket, &ack, hub.settings.write_timeout).await.is_err() {
        tracing::debug!(session_id = %session.id, "handshake ack write failed");
        hub.unregister(&session).await;
        session.set_state(SessionState::Closed);
        return;
    }
    session.set_state(SessionState::Live);

    let (ws_tx, ws_rx) = socket.split();
    let write_task = {
        let session = Arc::clone(&session);
        let write_timeout = hub.settings.write_timeout;
        let ping_interval = hub.settings.ping_interval;
        tokio::spawn(write_pump(session, outbound_rx, ws_tx, write_timeout, ping_interval))
    };

    read_pump(&state, &session, ws_rx).await;

    session.set_state(SessionState::Draining);
    hub.unregister(&session).await;
    let _ = write_task.await;
    session.set_state(SessionState::Closed);
    tracing::info!(session_id = %session.id, "extension disconnected");
}

/// Write pump: sole consumer of the outbound queue, also drives liveness
/// pings. Exits when the done signal fires, the queue closes, or a write
/// fails (cancelling done so the read pump follows).
async fn write_pump(
    session: Arc<Session>,
    mut outbound: tokio::sync::mpsc::Receiver<ServerFrame>,
    mut ws_tx: SplitSink<WebSocket, Message>,
    write_timeout: Duration,
    ping_interval: Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so pings start one
    // interval after the handshake.
    ping.tick().await;

    loop {
        tokio::select! {
            _ = session.done.cancelled() => break,

            _ = ping.tick() => {
                let frame = ServerFrame::Ping { timestamp: epoch_ms() };
                if write_frame(&mut ws_tx, &frame, write_timeout).await.is_err() {
                    tracing::debug!(session_id = %session.id, "ping write failed");
                    session.done.cancel();
                    break;
                }
            }

            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if write_frame(&mut ws_tx, &frame, write_timeout).await.is_err() {
                            tracing::debug!(session_id = %session.id, "socket write failed");
                            session.done.cancel();
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    // Best-effort close frame; the peer may already be gone.
    let _ = tokio::time::timeout(write_timeout, ws_tx.send(Message::Close(None))).await;
}

/// Read pump: enforces the heartbeat deadline and frame-size cap, and
/// dispatches inbound frames. Any exit triggers unregistration.
async fn read_pump(
    state: &Arc<RelayState>,
    session: &Arc<Session>,
    mut ws_rx: SplitStream<WebSocket>,
) {
    let window = state.hub.settings.read_deadline();
    let max_frame = state.hub.settings.max_frame_bytes;
    let mut deadline = tokio::time::Instant::now() + window;

    loop {
        let msg = tokio::select! {
            _ = session.done.cancelled() => break,

            received = tokio::time::timeout_at(deadline, ws_rx.next()) => {
                match received {
                    Err(_) => {
                        tracing::info!(session_id = %session.id, "heartbeat deadline expired");
                        break;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        tracing::debug!(session_id = %session.id, err = %e, "socket read error");
                        break;
                    }
                    Ok(Some(Ok(msg))) => msg,
                }
            }
        };

        match msg {
            Message::Text(text) => {
                if text.len() > max_frame {
                    tracing::warn!(
                        session_id = %session.id,
                        size = text.len(),
                        "oversize frame, closing session"
                    );
                    break;
                }
                let frame: ExtensionFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(session_id = %session.id, err = %e, "undecodable frame");
                        continue;
                    }
                };
                if matches!(frame, ExtensionFrame::Pong { .. }) {
                    deadline = tokio::time::Instant::now() + window;
                }
                handle_frame(state, session, frame).await;
            }
            Message::Close(_) => break,
            // Protocol-level ping/pong and binary frames are not part of
            // the contract; axum answers pings itself.
            _ => {}
        }
    }
}

/// Dispatch one decoded frame from the extension.
async fn handle_frame(state: &Arc<RelayState>, session: &Arc<Session>, frame: ExtensionFrame) {
    match frame {
        ExtensionFrame::TabAttach { tab_id, url, title, fav_icon_url } => {
            tracing::debug!(session_id = %session.id, tab_id = %tab_id, "tab attached");
            session.tabs.write().await.insert(
                tab_id.clone(),
                Tab { id: tab_id, url, title, fav_icon_url, attached_at: epoch_ms() },
            );
        }
        ExtensionFrame::TabDetach { tab_id } => {
            tracing::debug!(session_id = %session.id, tab_id = %tab_id, "tab detached");
            session.tabs.write().await.remove(&tab_id);
        }
        ExtensionFrame::TabUpdate { tab_id, url, title } => {
            let mut tabs = session.tabs.write().await;
            if let Some(tab) = tabs.get_mut(&tab_id) {
                if let Some(url) = url {
                    tab.url = url;
                }
                if let Some(title) = title {
                    tab.title = title;
                }
            }
        }
        ExtensionFrame::Pong { tab_count, .. } => {
            session.touch_heartbeat();
            tracing::trace!(session_id = %session.id, tab_count, "pong");
        }
        ExtensionFrame::CommandResponse(resp) => {
            state.hub.handle_response(resp);
        }
        ExtensionFrame::Unknown => {
            tracing::debug!(session_id = %session.id, "ignoring unknown frame type");
        }
    }
}

/// Serialize and send a frame directly on an unsplit socket (handshake).
async fn send_frame(
    socket: &mut WebSocket,
    frame: &ServerFrame,
    write_timeout: Duration,
) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    match tokio::time::timeout(write_timeout, socket.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

/// Serialize and send a frame with a per-write deadline.
async fn write_frame(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
    write_timeout: Duration,
) -> Result<(), ()> {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(err = %e, "failed to serialize outbound frame");
            return Ok(());
        }
    };
    match tokio::time::timeout(write_timeout, ws_tx.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

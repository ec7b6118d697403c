// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::protocol::ServerFrame;
use crate::state::epoch_ms;

/// A browser tab the extension has opted into controlling.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fav_icon_url: Option<String>,
    pub attached_at: u64,
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Handshaking = 0,
    Live = 1,
    Draining = 2,
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Handshaking,
            1 => Self::Live,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handshaking => "handshaking",
            Self::Live => "live",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

/// Enqueue failure on a session's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// Queue full; the caller should retry later.
    Backpressured,
    /// Write pump gone; the session is dead.
    Closed,
}

/// The relay's view of one live extension socket.
///
/// The hub owns sessions; everything else holds `Arc` clones carrying only
/// what dispatch needs (the outbound queue and the done signal), so the
/// ownership graph stays acyclic.
pub struct Session {
    pub id: String,
    /// Digest of the token this socket authenticated with.
    pub digest: String,
    pub token_name: String,
    pub extension_version: Option<String>,
    /// Epoch milliseconds at handshake.
    pub connected_at: u64,
    /// Tabs reported by the extension. Written only by this session's
    /// read pump; snapshotted by status queries.
    pub tabs: RwLock<HashMap<String, Tab>>,
    /// Fires when the session must tear down: takeover, shutdown, or a
    /// pump failure.
    pub done: CancellationToken,
    last_heartbeat_ms: AtomicU64,
    state: AtomicU8,
    outbound: mpsc::Sender<ServerFrame>,
}

impl Session {
    pub(crate) fn new(
        digest: &str,
        token_name: &str,
        extension_version: Option<String>,
        queue_depth: usize,
    ) -> (Arc<Self>, mpsc::Receiver<ServerFrame>) {
        let (outbound, outbound_rx) = mpsc::channel(queue_depth);
        let now = epoch_ms();
        let session = Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            digest: digest.to_owned(),
            token_name: token_name.to_owned(),
            extension_version,
            connected_at: now,
            tabs: RwLock::new(HashMap::new()),
            done: CancellationToken::new(),
            last_heartbeat_ms: AtomicU64::new(now),
            state: AtomicU8::new(SessionState::Handshaking as u8),
            outbound,
        });
        (session, outbound_rx)
    }

    /// Non-blocking enqueue onto the outbound queue. A full queue is
    /// backpressure, not a silent drop.
    pub fn enqueue(&self, frame: ServerFrame) -> Result<(), EnqueueError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Backpressured,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    pub fn touch_heartbeat(&self) {
        self.last_heartbeat_ms.store(epoch_ms(), Ordering::Relaxed);
    }

    /// Epoch milliseconds of the last heartbeat (handshake time until the
    /// first pong arrives).
    pub fn last_heartbeat_ms(&self) -> u64 {
        self.last_heartbeat_ms.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn set_state(&self, next: SessionState) {
        let prev = self.state.swap(next as u8, Ordering::Relaxed);
        if prev != next as u8 {
            tracing::trace!(
                session_id = %self.id,
                prev = SessionState::from_u8(prev).as_str(),
                next = next.as_str(),
                "session state change"
            );
        }
    }

    pub async fn tab_count(&self) -> usize {
        self.tabs.read().await.len()
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay hub: session registry, pending-request correlator, and the
//! per-session socket pumps.

pub mod pending;
pub mod session;
pub mod socket;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::{Action, CommandResponse, ServerFrame};
use pending::PendingTable;
use session::{EnqueueError, Session, SessionState};

/// Hub knobs derived from process config.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub queue_depth: usize,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub write_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl HubSettings {
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            queue_depth: config.outbound_queue_depth,
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
            write_timeout: config.write_timeout(),
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Read-side deadline: a pong must arrive within one ping interval
    /// plus the pong grace.
    pub fn read_deadline(&self) -> Duration {
        self.ping_interval + self.pong_timeout
    }
}

/// Session registry plus correlator. Singleton per process, created at
/// startup and drained at shutdown.
pub struct Hub {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    pending: PendingTable,
    pub settings: HubSettings,
}

impl Hub {
    pub fn new(settings: HubSettings) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), pending: PendingTable::new(), settings }
    }

    /// Create and install a session for a token digest. An existing
    /// session under the same digest is taken over: its done signal fires
    /// and the registry entry is replaced atomically.
    pub async fn register(
        &self,
        digest: &str,
        token_name: &str,
        extension_version: Option<String>,
    ) -> (Arc<Session>, mpsc::Receiver<ServerFrame>) {
        let (session, outbound_rx) =
            Session::new(digest, token_name, extension_version, self.settings.queue_depth);

        let old = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(digest.to_owned(), Arc::clone(&session))
        };
        if let Some(old) = old {
            old.set_state(SessionState::Draining);
            old.done.cancel();
            tracing::info!(
                old_session = %old.id,
                new_session = %session.id,
                token = %token_name,
                "session takeover"
            );
        }

        (session, outbound_rx)
    }

    /// Remove a session from the registry and fire its done signal. The
    /// removal is identity-checked so a superseded session's tear-down
    /// never evicts its replacement.
    pub async fn unregister(&self, session: &Arc<Session>) {
        {
            let mut sessions = self.sessions.write().await;
            if sessions.get(&session.digest).is_some_and(|s| Arc::ptr_eq(s, session)) {
                sessions.remove(&session.digest);
            }
        }
        session.done.cancel();
    }

    pub async fn session(&self, digest: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(digest).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Dispatch a command to the session bound to `digest` and block until
    /// its response, the timeout, or session death. The pending entry is
    /// removed on every exit path, including caller cancellation.
    pub async fn send_command(
        &self,
        digest: &str,
        tab_id: String,
        action: Action,
        timeout: Duration,
    ) -> Result<CommandResponse, RelayError> {
        let session = self.session(digest).await.ok_or(RelayError::ExtensionOffline)?;

        let mut slot = self.pending.register();
        let frame = ServerFrame::Command {
            id: slot.id,
            tab_id,
            timeout_ms: timeout.as_millis() as u64,
            action,
        };
        match session.enqueue(frame) {
            Ok(()) => {}
            Err(EnqueueError::Backpressured) => {
                tracing::warn!(session_id = %session.id, "outbound queue full");
                return Err(RelayError::Backpressured);
            }
            Err(EnqueueError::Closed) => return Err(RelayError::ExtensionOffline),
        }

        tokio::select! {
            resp = &mut slot.rx => resp.map_err(|_| RelayError::ExtensionOffline),
            _ = tokio::time::sleep(timeout) => Err(RelayError::Timeout),
            _ = session.done.cancelled() => Err(RelayError::ExtensionOffline),
        }
    }

    /// Route a command response to its waiting caller; late responses are
    /// dropped without side effects.
    pub fn handle_response(&self, resp: CommandResponse) {
        let id = resp.id;
        if !self.pending.resolve(resp) {
            tracing::debug!(correlation_id = id, "dropping late command response");
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Wait up to `grace` for in-flight commands to resolve.
    pub async fn drain(&self, grace: Duration) {
        let deadline = tokio::time::Instant::now() + grace;
        while !self.pending.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Signal every session to tear down. Idempotent.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> =
            self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.set_state(SessionState::Draining);
            session.done.cancel();
        }
        if !sessions.is_empty() {
            tracing::info!(count = sessions.len(), "closed all sessions");
        }
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-request table: correlation id to single-slot response sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::protocol::CommandResponse;

/// Process-wide table of in-flight commands. The lock is plain `std` and
/// is never held across an await.
pub struct PendingTable {
    slots: Mutex<HashMap<u64, oneshot::Sender<CommandResponse>>>,
    next_id: AtomicU64,
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingTable {
    pub fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Allocate a fresh correlation id and install its sink. The returned
    /// slot removes the entry on drop, whatever path resolves the wait.
    pub fn register(&self) -> PendingSlot<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        PendingSlot { id, rx, table: self }
    }

    /// Deliver a response to its waiting sink. Returns false when nothing
    /// is waiting (late response after timeout or cancellation).
    pub fn resolve(&self, resp: CommandResponse) -> bool {
        let sender = self.lock().remove(&resp.id);
        match sender {
            Some(tx) => tx.send(resp).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<CommandResponse>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// An installed pending entry plus its receive half.
pub struct PendingSlot<'a> {
    pub id: u64,
    pub rx: oneshot::Receiver<CommandResponse>,
    table: &'a PendingTable,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token store: opaque bearer credentials persisted by digest only.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Fixed recognizable prefix for every issued token.
pub const TOKEN_PREFIX: &str = "tbr_";

/// Random bytes in a token suffix (64 hex characters).
const TOKEN_RANDOM_BYTES: usize = 32;

/// Generate a fresh plaintext token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_RANDOM_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{TOKEN_PREFIX}{}", hex::encode(bytes))
}

/// One-way digest of a plaintext token, as lowercase hex.
pub fn token_digest(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// A stored token record. The digest is deliberately not carried here so
/// listings can never leak it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiToken {
    pub id: i64,
    pub name: String,
    pub rpm_limit: u32,
    pub created_at: i64,
    pub last_used_at: Option<i64>,
    pub revoked_at: Option<i64>,
}

/// Identity attached to an authenticated request or socket.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub id: i64,
    pub digest: String,
    pub name: String,
    pub rpm_limit: u32,
}

/// SQLite-backed token store. The connection is a singleton writer behind
/// an async mutex; every query is short and never spans an await of its
/// own.
#[derive(Clone)]
pub struct TokenStore {
    conn: Arc<Mutex<Connection>>,
}

impl TokenStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Create a token and return its plaintext, which is never stored and
    /// never retrievable again.
    pub async fn create(&self, name: &str, rpm_limit: u32) -> anyhow::Result<(String, ApiToken)> {
        let plaintext = generate_token();
        let digest = token_digest(&plaintext);
        let created_at = epoch_secs();

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO tokens (digest, name, rpm_limit, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![digest, name, rpm_limit, created_at],
        )?;
        let id = conn.last_insert_rowid();

        let record = ApiToken {
            id,
            name: name.to_owned(),
            rpm_limit,
            created_at,
            last_used_at: None,
            revoked_at: None,
        };
        Ok((plaintext, record))
    }

    /// Validate a plaintext token. `Ok(None)` means unknown or revoked;
    /// the two cases are only distinguished in logs.
    pub async fn validate(&self, plaintext: &str) -> anyhow::Result<Option<ValidatedToken>> {
        let digest = token_digest(plaintext);

        let row = {
            let conn = self.conn.lock().await;
            let mut stmt = conn.prepare(
                "SELECT id, name, rpm_limit, revoked_at FROM tokens WHERE digest = ?1",
            )?;
            let mut rows = stmt.query_map([&digest], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, u32>(2)?,
                    r.get::<_, Option<i64>>(3)?,
                ))
            })?;
            rows.next().transpose()?
        };

        let Some((id, name, rpm_limit, revoked_at)) = row else {
            tracing::debug!("token digest not found");
            return Ok(None);
        };
        if revoked_at.is_some() {
            tracing::debug!(token_id = id, "rejected revoked token");
            return Ok(None);
        }

        self.spawn_touch_last_used(id);
        Ok(Some(ValidatedToken { id, digest, name, rpm_limit }))
    }

    /// List all tokens, newest first.
    pub async fn list(&self) -> anyhow::Result<Vec<ApiToken>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, name, rpm_limit, created_at, last_used_at, revoked_at \
             FROM tokens ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(ApiToken {
                id: r.get(0)?,
                name: r.get(1)?,
                rpm_limit: r.get(2)?,
                created_at: r.get(3)?,
                last_used_at: r.get(4)?,
                revoked_at: r.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Revoke a token. Returns false when the id is unknown or the token
    /// was already revoked.
    pub async fn revoke(&self, id: i64) -> anyhow::Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE tokens SET revoked_at = ?1 WHERE id = ?2 AND revoked_at IS NULL",
            rusqlite::params![epoch_secs(), id],
        )?;
        Ok(changed > 0)
    }

    /// Stamp last-use for a token.
    pub async fn touch_last_used(&self, id: i64) -> anyhow::Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            rusqlite::params![epoch_secs(), id],
        )?;
        Ok(())
    }

    /// Best-effort async last-use stamp; validation never blocks on it.
    fn spawn_touch_last_used(&self, id: i64) {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(id).await {
                tracing::debug!(token_id = id, err = %e, "failed to stamp last-used");
            }
        });
    }
}

fn epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ephemeral screenshot artifacts: size-capped, random-named, TTL-bound.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::protocol::ImageFormat;
use crate::state::epoch_ms;

/// Screenshot payload the extension returns inside a command response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotPayload {
    /// Base64-encoded image bytes.
    pub data: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format: Option<ImageFormat>,
}

/// What the REST caller gets back after materialization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotInfo {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Decoded size in bytes.
    pub size: u64,
    /// Epoch milliseconds after which the artifact is gone.
    pub expires_at: u64,
}

pub struct ScreenshotStore {
    dir: PathBuf,
    ttl: Duration,
    max_bytes: usize,
}

impl ScreenshotStore {
    pub fn new(dir: PathBuf, ttl: Duration, max_bytes: usize) -> Self {
        Self { dir, ttl, max_bytes }
    }

    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Decode and persist a screenshot under a random filename, scheduling
    /// deletion after the TTL. Oversize payloads are rejected before any
    /// decoding or disk write happens.
    pub async fn materialize(
        &self,
        payload: &ScreenshotPayload,
    ) -> Result<ScreenshotInfo, RelayError> {
        // Base64 expands by 4/3, so this rejects before decoding.
        if payload.data.len() / 4 * 3 > self.max_bytes {
            return Err(RelayError::FileTooLarge);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&payload.data)
            .map_err(|_| RelayError::FileTooLarge)?;
        if bytes.len() > self.max_bytes {
            return Err(RelayError::FileTooLarge);
        }

        let format = payload.format.unwrap_or(ImageFormat::Png);
        let mut random = [0u8; 16];
        rand::rng().fill_bytes(&mut random);
        let name = format!("{}.{}", hex::encode(random), format.extension());

        let path = self.dir.join(&name);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            tracing::error!(path = %path.display(), err = %e, "screenshot write failed");
            return Err(RelayError::Internal);
        }

        self.schedule_delete(path, name.clone());

        Ok(ScreenshotInfo {
            url: format!("/api/v1/screenshots/{name}"),
            width: payload.width,
            height: payload.height,
            size: bytes.len() as u64,
            expires_at: epoch_ms() + self.ttl.as_millis() as u64,
        })
    }

    fn schedule_delete(&self, path: PathBuf, name: String) {
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(name = %name, "expired screenshot deleted"),
                Err(e) => tracing::debug!(name = %name, err = %e, "screenshot already gone"),
            }
        });
    }

    /// Read a previously materialized artifact. `None` covers missing,
    /// expired, and unservable names alike.
    pub async fn open(&self, name: &str) -> Option<(Vec<u8>, &'static str)> {
        let name = sanitize_name(name)?;
        let content_type = match name.rsplit_once('.')?.1 {
            "png" => ImageFormat::Png.content_type(),
            "jpeg" | "jpg" => ImageFormat::Jpeg.content_type(),
            _ => return None,
        };
        let bytes = tokio::fs::read(self.dir.join(name)).await.ok()?;
        Some((bytes, content_type))
    }

    /// Remove leftover files older than the TTL. Catches artifacts whose
    /// delete task died with a previous process.
    pub async fn sweep(&self) {
        let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else { continue };
            let expired = meta
                .modified()
                .ok()
                .and_then(|m| m.elapsed().ok())
                .is_some_and(|age| age > self.ttl);
            if expired {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
    }

    /// Spawn the periodic orphan sweeper.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) {
        let store = Arc::clone(self);
        let period = self.ttl.max(Duration::from_secs(60));
        tokio::spawn(async move {
            store.sweep().await;
            let mut tick = tokio::time::interval(period);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => store.sweep().await,
                }
            }
        });
    }
}

/// Accept only flat, extension-bearing filenames; anything path-like is
/// refused before it reaches the filesystem.
fn sanitize_name(name: &str) -> Option<&str> {
    if name.is_empty()
        || name.starts_with('.')
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return None;
    }
    Some(name)
}

#[cfg(test)]
#[path = "screenshot_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::hub::{Hub, HubSettings};
use crate::ratelimit::RateLimiter;
use crate::screenshot::ScreenshotStore;
use crate::store::TokenStore;

/// Shared relay state, constructed once at startup.
pub struct RelayState {
    pub config: RelayConfig,
    pub store: TokenStore,
    pub hub: Hub,
    pub limiter: Arc<RateLimiter>,
    pub screenshots: Arc<ScreenshotStore>,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl RelayState {
    pub fn new(config: RelayConfig, store: TokenStore, shutdown: CancellationToken) -> Self {
        let hub = Hub::new(HubSettings::from_config(&config));
        let screenshots = Arc::new(ScreenshotStore::new(
            config.screenshot_dir.clone(),
            config.screenshot_ttl(),
            config.max_screenshot_bytes,
        ));
        Self {
            config,
            store,
            hub,
            limiter: Arc::new(RateLimiter::new()),
            screenshots,
            shutdown,
            started_at: Instant::now(),
        }
    }
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

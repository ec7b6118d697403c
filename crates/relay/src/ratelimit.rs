// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-window request counter, keyed by token id. Per-process only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Window length for every limit.
const WINDOW: Duration = Duration::from_secs(60);

/// How long an expired window may linger before the sweeper evicts it.
const SWEEP_GRACE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    window_end: Instant,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Seconds until the window resets; only meaningful when denied.
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    windows: Mutex<HashMap<i64, Window>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { windows: Mutex::new(HashMap::new()) }
    }

    /// Count one request against `key` with the given per-minute limit.
    pub fn allow(&self, key: i64, limit: u32) -> Decision {
        self.allow_at(key, limit, Instant::now())
    }

    fn allow_at(&self, key: i64, limit: u32, now: Instant) -> Decision {
        let mut windows = self.lock();
        match windows.get_mut(&key) {
            Some(window) if now < window.window_end => {
                if window.count < limit {
                    window.count += 1;
                    Decision { allowed: true, retry_after_secs: 0 }
                } else {
                    let remaining = window.window_end.saturating_duration_since(now);
                    let retry_after_secs = (remaining.as_secs_f64().ceil() as u64).max(1);
                    Decision { allowed: false, retry_after_secs }
                }
            }
            _ => {
                windows.insert(key, Window { count: 1, window_end: now + WINDOW });
                Decision { allowed: true, retry_after_secs: 0 }
            }
        }
    }

    /// Evict windows that ended more than `grace` ago.
    pub fn sweep(&self, grace: Duration) {
        let now = Instant::now();
        self.lock().retain(|_, w| now < w.window_end + grace);
    }

    /// Spawn the periodic sweeper that bounds table memory.
    pub fn spawn_sweeper(self: &Arc<Self>, shutdown: CancellationToken) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(WINDOW);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tick.tick() => limiter.sweep(SWEEP_GRACE),
                }
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, Window>> {
        match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[cfg(test)]
    fn window_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
#[path = "ratelimit_tests.rs"]
mod tests;

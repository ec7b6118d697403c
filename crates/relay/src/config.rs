// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the relay server, loaded from flags or environment.
#[derive(Debug, Clone, clap::Args)]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "RELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8787, env = "RELAY_PORT")]
    pub port: u16,

    /// Path to the token database.
    #[arg(long = "db", default_value = "tabrelay.db", env = "RELAY_DB_PATH")]
    pub db_path: PathBuf,

    /// Directory for ephemeral screenshot files.
    #[arg(long, default_value = "screenshots", env = "RELAY_SCREENSHOT_DIR")]
    pub screenshot_dir: PathBuf,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "info", env = "RELAY_LOG_LEVEL")]
    pub log_level: String,

    /// Seconds before a materialized screenshot is deleted.
    #[arg(long, default_value_t = 300, env = "RELAY_SCREENSHOT_TTL_SECS")]
    pub screenshot_ttl_secs: u64,

    /// Default command timeout in milliseconds when a request sets none.
    #[arg(long, default_value_t = 30_000, env = "RELAY_COMMAND_TIMEOUT_MS")]
    pub command_timeout_ms: u64,

    /// Liveness ping interval in seconds.
    #[arg(long, default_value_t = 30, env = "RELAY_PING_INTERVAL_SECS")]
    pub ping_interval_secs: u64,

    /// Grace period in seconds for a pong after a ping.
    #[arg(long, default_value_t = 10, env = "RELAY_PONG_TIMEOUT_SECS")]
    pub pong_timeout_secs: u64,

    /// Per-write socket deadline in seconds.
    #[arg(long, default_value_t = 10, env = "RELAY_WRITE_TIMEOUT_SECS")]
    pub write_timeout_secs: u64,

    /// Maximum inbound socket frame size in bytes.
    #[arg(long, default_value_t = 512 * 1024, env = "RELAY_MAX_FRAME_BYTES")]
    pub max_frame_bytes: usize,

    /// Outbound queue depth per session.
    #[arg(long, default_value_t = 256, env = "RELAY_OUTBOUND_QUEUE_DEPTH")]
    pub outbound_queue_depth: usize,

    /// Maximum decoded screenshot size in bytes.
    #[arg(long, default_value_t = 10 * 1024 * 1024, env = "RELAY_MAX_SCREENSHOT_BYTES")]
    pub max_screenshot_bytes: usize,

    /// Seconds to let in-flight commands finish during shutdown.
    #[arg(long, default_value_t = 10, env = "RELAY_SHUTDOWN_GRACE_SECS")]
    pub shutdown_grace_secs: u64,
}

impl RelayConfig {
    pub fn screenshot_ttl(&self) -> Duration {
        Duration::from_secs(self.screenshot_ttl_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

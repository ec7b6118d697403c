// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tabrelay: bridges API agents to live browser sessions through a
//! persistent extension socket.

pub mod cli;
pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod ratelimit;
pub mod screenshot;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::store::TokenStore;
use crate::transport::build_router;

/// Run the relay server until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    init_tracing(&config.log_level);

    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let grace = config.shutdown_grace();

    let store = TokenStore::open(&config.db_path)?;
    let state = Arc::new(RelayState::new(config, store, shutdown.clone()));
    state.screenshots.ensure_dir().await?;

    state.limiter.spawn_sweeper(shutdown.clone());
    state.screenshots.spawn_sweeper(shutdown.clone());
    spawn_signal_watcher(shutdown.clone());

    // Drain sequence: the cancelled token stops the accept loop; in-flight
    // commands get a bounded window to finish before sessions are cut.
    {
        let state = Arc::clone(&state);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            info!("shutting down, draining in-flight commands");
            state.hub.drain(grace).await;
            state.hub.close_all().await;
        });
    }

    let listener = TcpListener::bind(&addr).await?;
    info!("tabrelay listening on {addr}");
    let router = build_router(Arc::clone(&state));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    state.hub.close_all().await;
    info!("tabrelay stopped");
    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let result = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    drop(result);
}

/// Cancel the shutdown token on SIGINT or SIGTERM.
fn spawn_signal_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received interrupt"),
            _ = terminate => info!("received terminate"),
        }
        shutdown.cancel();
    });
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the relay.

pub mod auth;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Extension state
        .route("/api/v1/status", get(http::status))
        .route("/api/v1/tabs", get(http::tabs))
        // Dispatch
        .route("/api/v1/command", post(http::command))
        .route("/api/v1/screenshot", post(http::screenshot))
        .route("/api/v1/snapshot", post(http::snapshot))
        // Artifacts (no auth; names are unguessable)
        .route("/api/v1/screenshots/{name}", get(http::serve_screenshot))
        // Extension socket
        .route("/ws", get(ws::ws_handler))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

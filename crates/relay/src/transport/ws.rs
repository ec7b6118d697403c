// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extension socket upgrade handler.

use std::sync::Arc;

use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::RelayError;
use crate::hub::socket::serve_session;
use crate::state::RelayState;
use crate::transport::auth;

/// Query parameters for the socket upgrade.
#[derive(Debug, Clone, Deserialize)]
pub struct WsQuery {
    /// Token, for clients that cannot set headers on the upgrade request.
    pub token: Option<String>,
    /// Extension version string, recorded on the session.
    pub version: Option<String>,
}

/// `GET /ws` — duplex socket upgrade for the extension.
///
/// The token arrives as a `token` query parameter or a bearer header;
/// rejection happens before the upgrade with the same error shape as the
/// REST surface.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let plaintext = match query
        .token
        .clone()
        .or_else(|| auth::bearer_token(&headers).map(ToOwned::to_owned))
    {
        Some(token) => token,
        None => return RelayError::Unauthorized.into_response(),
    };

    let token = match auth::authenticate(&state, &plaintext).await {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = auth::check_rate_limit(&state, &token) {
        return e.into_response();
    }

    let max_frame = state.hub.settings.max_frame_bytes;
    ws.max_message_size(max_frame)
        .max_frame_size(max_frame)
        .on_upgrade(move |socket| serve_session(state, socket, token, query.version))
        .into_response()
}

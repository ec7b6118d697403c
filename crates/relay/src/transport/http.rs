// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST handlers: thin adapters from HTTP to hub dispatches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::hub::session::Tab;
use crate::protocol::{Action, CommandResponse, ResponseError};
use crate::screenshot::ScreenshotPayload;
use crate::state::RelayState;
use crate::store::ValidatedToken;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandRequest {
    #[serde(default)]
    tab_id: Option<String>,
    action: Option<serde_json::Value>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    pub timing: ReplyTiming,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyTiming {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    /// Round-trip through the relay, milliseconds.
    pub total: u64,
}

impl CommandReply {
    fn from_response(resp: CommandResponse, elapsed: Duration) -> Self {
        let (received, completed) = match resp.timing {
            Some(t) => (Some(t.received), Some(t.completed)),
            None => (None, None),
        };
        Self {
            success: resp.success,
            result: resp.result,
            error: resp.error,
            timing: ReplyTiming { received, completed, total: elapsed.as_millis() as u64 },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotRequest {
    #[serde(default)]
    tab_id: Option<String>,
    #[serde(default)]
    full_page: Option<bool>,
    #[serde(default)]
    clip: Option<crate::protocol::ClipRect>,
    #[serde(default)]
    quality: Option<u8>,
    #[serde(default)]
    format: Option<crate::protocol::ImageFormat>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRequest {
    #[serde(default)]
    tab_id: Option<String>,
    #[serde(default)]
    max_depth: Option<u32>,
    #[serde(default)]
    max_length: Option<u64>,
    #[serde(default)]
    include_styles: Option<bool>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

/// DOM snapshot payload the extension returns.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReply {
    pub html: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub truncated: bool,
}

// -- Helpers ------------------------------------------------------------------

/// Decode a request body field-by-field so malformed input maps to 400
/// INVALID_REQUEST instead of a framework rejection.
fn decode_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, Response> {
    serde_json::from_value(body).map_err(|e| {
        RelayError::InvalidRequest.to_http_response(format!("invalid request body: {e}"))
    })
}

fn require_tab_id(tab_id: Option<String>) -> Result<String, Response> {
    match tab_id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(RelayError::InvalidRequest.to_http_response("missing tab id")),
    }
}

fn effective_timeout(state: &RelayState, timeout_ms: Option<u64>) -> Duration {
    match timeout_ms {
        Some(ms) if ms > 0 => Duration::from_millis(ms),
        _ => state.config.command_timeout(),
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        uptime_secs: s.started_at.elapsed().as_secs(),
    })
}

/// `GET /api/v1/status` — connection state for the caller's extension.
pub async fn status(
    State(s): State<Arc<RelayState>>,
    Extension(token): Extension<ValidatedToken>,
) -> impl IntoResponse {
    match s.hub.session(&token.digest).await {
        Some(session) => Json(StatusResponse {
            connected: true,
            last_seen: Some(session.last_heartbeat_ms()),
            extension_version: session.extension_version.clone(),
            tab_count: Some(session.tab_count().await),
        }),
        None => Json(StatusResponse {
            connected: false,
            last_seen: None,
            extension_version: None,
            tab_count: None,
        }),
    }
}

/// `GET /api/v1/tabs` — tabs reported by the caller's extension.
pub async fn tabs(
    State(s): State<Arc<RelayState>>,
    Extension(token): Extension<ValidatedToken>,
) -> Response {
    let Some(session) = s.hub.session(&token.digest).await else {
        return RelayError::ExtensionOffline.into_response();
    };
    let mut list: Vec<Tab> = session.tabs.read().await.values().cloned().collect();
    list.sort_by(|a, b| a.attached_at.cmp(&b.attached_at).then_with(|| a.id.cmp(&b.id)));
    Json(list).into_response()
}

/// `POST /api/v1/command` — dispatch one action and wait for its response.
pub async fn command(
    State(s): State<Arc<RelayState>>,
    Extension(token): Extension<ValidatedToken>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let req: CommandRequest = match decode_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let tab_id = match require_tab_id(req.tab_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Some(action_value) = req.action else {
        return RelayError::InvalidRequest.to_http_response("missing action");
    };
    let action: Action = match serde_json::from_value(action_value) {
        Ok(action) => action,
        Err(e) => {
            return RelayError::InvalidRequest.to_http_response(format!("invalid action: {e}"))
        }
    };
    if let Err(msg) = action.validate() {
        return RelayError::InvalidRequest.to_http_response(msg);
    }

    let timeout = effective_timeout(&s, req.timeout_ms);
    let kind = action.kind();
    let started = Instant::now();
    match s.hub.send_command(&token.digest, tab_id, action, timeout).await {
        Ok(resp) => {
            tracing::debug!(kind, elapsed_ms = started.elapsed().as_millis() as u64, "command done");
            Json(CommandReply::from_response(resp, started.elapsed())).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// `POST /api/v1/screenshot` — dispatch a screenshot and materialize the
/// result on disk behind an ephemeral URL.
pub async fn screenshot(
    State(s): State<Arc<RelayState>>,
    Extension(token): Extension<ValidatedToken>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let req: ScreenshotRequest = match decode_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let tab_id = match require_tab_id(req.tab_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let action = Action::Screenshot {
        full_page: req.full_page,
        clip: req.clip,
        quality: req.quality,
        format: req.format,
    };
    let timeout = effective_timeout(&s, req.timeout_ms);
    let resp = match s.hub.send_command(&token.digest, tab_id, action, timeout).await {
        Ok(resp) => resp,
        Err(e) => return e.into_response(),
    };
    if !resp.success {
        let message = resp
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| "screenshot failed".to_owned());
        return RelayError::Internal.to_http_response(message);
    }
    let Some(result) = resp.result else {
        return RelayError::Internal.to_http_response("screenshot result missing");
    };
    let payload: ScreenshotPayload = match serde_json::from_value(result) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(err = %e, "malformed screenshot result");
            return RelayError::Internal.to_http_response("malformed screenshot result");
        }
    };

    match s.screenshots.materialize(&payload).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /api/v1/snapshot` — dispatch a DOM snapshot.
pub async fn snapshot(
    State(s): State<Arc<RelayState>>,
    Extension(token): Extension<ValidatedToken>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let req: SnapshotRequest = match decode_body(body) {
        Ok(req) => req,
        Err(resp) => return resp,
    };
    let tab_id = match require_tab_id(req.tab_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let action = Action::Snapshot {
        max_depth: req.max_depth,
        max_length: req.max_length,
        include_styles: req.include_styles,
    };
    let timeout = effective_timeout(&s, req.timeout_ms);
    let resp = match s.hub.send_command(&token.digest, tab_id, action, timeout).await {
        Ok(resp) => resp,
        Err(e) => return e.into_response(),
    };
    if !resp.success {
        let message =
            resp.error.map(|e| e.message).unwrap_or_else(|| "snapshot failed".to_owned());
        return RelayError::Internal.to_http_response(message);
    }
    let Some(result) = resp.result else {
        return RelayError::Internal.to_http_response("snapshot result missing");
    };
    match serde_json::from_value::<SnapshotReply>(result) {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "malformed snapshot result");
            RelayError::Internal.to_http_response("malformed snapshot result")
        }
    }
}

/// `GET /api/v1/screenshots/{name}` — serve an ephemeral artifact.
pub async fn serve_screenshot(
    State(s): State<Arc<RelayState>>,
    Path(name): Path<String>,
) -> Response {
    match s.screenshots.open(&name).await {
        Some((bytes, content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

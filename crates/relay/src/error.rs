// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the relay API.
///
/// Backpressure is surfaced to callers under the `EXTENSION_OFFLINE` code
/// (retryable 503) but kept as its own variant so logs can tell the two
/// apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    Unauthorized,
    InvalidRequest,
    RateLimited { retry_after_secs: u64 },
    ExtensionOffline,
    Backpressured,
    Timeout,
    FileTooLarge,
    Internal,
}

impl RelayError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::InvalidRequest => 400,
            Self::RateLimited { .. } => 429,
            Self::ExtensionOffline | Self::Backpressured => 503,
            Self::Timeout => 504,
            Self::FileTooLarge => 400,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::ExtensionOffline | Self::Backpressured => "EXTENSION_OFFLINE",
            Self::Timeout => "TIMEOUT",
            Self::FileTooLarge => "FILE_TOO_LARGE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidRequest => "invalid request",
            Self::RateLimited { .. } => "rate limit exceeded",
            Self::ExtensionOffline => "no extension connected",
            Self::Backpressured => "connection backpressured",
            Self::Timeout => "command timed out",
            Self::FileTooLarge => "file too large",
            Self::Internal => "internal error",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        let retry_after = match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        ErrorBody { code: self.as_str().to_owned(), message: message.into(), retry_after }
    }

    /// Build the full HTTP response for this error. `RATE_LIMITED` also
    /// carries a `Retry-After` header matching the body field.
    pub fn to_http_response(&self, message: impl Into<String>) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after_secs } = self {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.to_http_response(self.default_message())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "retryAfter", default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

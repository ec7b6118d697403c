// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the extension socket.
//!
//! All frames are JSON text with a `type` discriminator, expressed as
//! internally-tagged enums. Two top-level enums cover server-to-extension
//! and extension-to-server directions; command payloads are tagged by
//! `kind`.

use serde::{Deserialize, Serialize};

/// Frames the relay sends to the extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    HandshakeAck {
        session_id: String,
        /// Server wall clock, epoch milliseconds.
        server_time: u64,
        server_version: String,
    },
    HandshakeError {
        code: HandshakeErrorCode,
        message: String,
    },
    Ping {
        timestamp: u64,
    },
    Command {
        id: u64,
        tab_id: String,
        timeout_ms: u64,
        action: Action,
    },
}

/// Handshake rejection codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakeErrorCode {
    InvalidToken,
    TokenExpired,
    RateLimited,
    ServerError,
}

/// Frames the extension sends to the relay. Inbound only, so this enum
/// is never serialized.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ExtensionFrame {
    TabAttach {
        tab_id: String,
        url: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fav_icon_url: Option<String>,
    },
    TabDetach {
        tab_id: String,
    },
    TabUpdate {
        tab_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Pong {
        timestamp: u64,
        #[serde(default)]
        tab_count: u32,
    },
    CommandResponse(CommandResponse),
    /// Unrecognized frame types are logged and ignored.
    #[serde(other)]
    Unknown,
}

/// Response to a dispatched command, echoing its correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<ResponseTiming>,
}

/// Action-level error reported by the extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: String,
    pub message: String,
}

/// Extension-side timestamps for a command, epoch milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTiming {
    pub received: u64,
    pub completed: u64,
}

/// Browser actions dispatchable through the relay, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    Click {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinates: Option<Coordinates>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button: Option<MouseButton>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modifiers: Option<Vec<KeyModifier>>,
    },
    Type {
        selector: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clear: Option<bool>,
        /// Per-keystroke delay in milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<u64>,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        direction: ScrollDirection,
        amount: i64,
    },
    Screenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_page: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clip: Option<ClipRect>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<ImageFormat>,
    },
    Snapshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_depth: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        include_styles: Option<bool>,
    },
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_until: Option<WaitUntil>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::Scroll { .. } => "scroll",
            Self::Screenshot { .. } => "screenshot",
            Self::Snapshot { .. } => "snapshot",
            Self::Navigate { .. } => "navigate",
        }
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::Click { selector: None, coordinates: None, .. } => {
                Err("click requires a selector or coordinates")
            }
            Self::Type { selector, .. } if selector.is_empty() => {
                Err("type requires a non-empty selector")
            }
            Self::Navigate { url, .. } if url.is_empty() => {
                Err("navigate requires a non-empty url")
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// Viewport rectangle for a clipped screenshot, CSS pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyModifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    Domcontentloaded,
    Networkidle,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

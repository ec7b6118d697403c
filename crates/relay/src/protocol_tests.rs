// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

// ── server frames ─────────────────────────────────────────────────────

#[test]
fn handshake_ack_serializes_with_camel_case_fields() -> anyhow::Result<()> {
    let frame = ServerFrame::HandshakeAck {
        session_id: "s-1".to_owned(),
        server_time: 1234,
        server_version: "0.3.2".to_owned(),
    };
    let value = serde_json::to_value(&frame)?;
    assert_eq!(value["type"], "handshake_ack");
    assert_eq!(value["sessionId"], "s-1");
    assert_eq!(value["serverTime"], 1234);
    assert_eq!(value["serverVersion"], "0.3.2");
    Ok(())
}

#[test]
fn handshake_error_code_is_screaming_snake_case() -> anyhow::Result<()> {
    let frame = ServerFrame::HandshakeError {
        code: HandshakeErrorCode::InvalidToken,
        message: "bad token".to_owned(),
    };
    let value = serde_json::to_value(&frame)?;
    assert_eq!(value["type"], "handshake_error");
    assert_eq!(value["code"], "INVALID_TOKEN");
    Ok(())
}

#[test]
fn command_frame_carries_tab_id_and_timeout() -> anyhow::Result<()> {
    let frame = ServerFrame::Command {
        id: 7,
        tab_id: "t1".to_owned(),
        timeout_ms: 5000,
        action: Action::Click {
            selector: Some("#go".to_owned()),
            coordinates: None,
            button: None,
            modifiers: None,
        },
    };
    let value = serde_json::to_value(&frame)?;
    assert_eq!(value["type"], "command");
    assert_eq!(value["id"], 7);
    assert_eq!(value["tabId"], "t1");
    assert_eq!(value["timeoutMs"], 5000);
    assert_eq!(value["action"]["kind"], "click");
    assert_eq!(value["action"]["selector"], "#go");
    Ok(())
}

// ── extension frames ──────────────────────────────────────────────────

#[test]
fn tab_attach_parses() -> anyhow::Result<()> {
    let json = r#"{"type":"tab_attach","tabId":"t1","url":"https://example.test","title":"Example","favIconUrl":"https://example.test/favicon.ico"}"#;
    let frame: ExtensionFrame = serde_json::from_str(json)?;
    match frame {
        ExtensionFrame::TabAttach { tab_id, url, title, fav_icon_url } => {
            assert_eq!(tab_id, "t1");
            assert_eq!(url, "https://example.test");
            assert_eq!(title, "Example");
            assert_eq!(fav_icon_url.as_deref(), Some("https://example.test/favicon.ico"));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    Ok(())
}

#[test]
fn tab_update_fields_are_optional() -> anyhow::Result<()> {
    let json = r#"{"type":"tab_update","tabId":"t1","title":"New title"}"#;
    let frame: ExtensionFrame = serde_json::from_str(json)?;
    match frame {
        ExtensionFrame::TabUpdate { tab_id, url, title } => {
            assert_eq!(tab_id, "t1");
            assert!(url.is_none());
            assert_eq!(title.as_deref(), Some("New title"));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    Ok(())
}

#[test]
fn pong_defaults_tab_count() -> anyhow::Result<()> {
    let json = r#"{"type":"pong","timestamp":99}"#;
    let frame: ExtensionFrame = serde_json::from_str(json)?;
    match frame {
        ExtensionFrame::Pong { timestamp, tab_count } => {
            assert_eq!(timestamp, 99);
            assert_eq!(tab_count, 0);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    Ok(())
}

#[test]
fn command_response_parses_with_result_and_timing() -> anyhow::Result<()> {
    let json = r#"{"type":"command_response","id":7,"success":true,"result":{"clicked":true},"timing":{"received":10,"completed":25}}"#;
    let frame: ExtensionFrame = serde_json::from_str(json)?;
    match frame {
        ExtensionFrame::CommandResponse(resp) => {
            assert_eq!(resp.id, 7);
            assert!(resp.success);
            assert_eq!(resp.result.as_ref().map(|r| r["clicked"].clone()), Some(true.into()));
            let timing = resp.timing.as_ref().map(|t| (t.received, t.completed));
            assert_eq!(timing, Some((10, 25)));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    Ok(())
}

#[test]
fn command_response_error_shape_parses() -> anyhow::Result<()> {
    let json = r##"{"type":"command_response","id":3,"success":false,"error":{"code":"NO_SUCH_ELEMENT","message":"#go not found"}}"##;
    let frame: ExtensionFrame = serde_json::from_str(json)?;
    match frame {
        ExtensionFrame::CommandResponse(resp) => {
            assert!(!resp.success);
            let err = resp.error.as_ref().map(|e| e.code.as_str());
            assert_eq!(err, Some("NO_SUCH_ELEMENT"));
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_frame_type_maps_to_unknown() -> anyhow::Result<()> {
    let json = r#"{"type":"telemetry","cpu":0.4}"#;
    let frame: ExtensionFrame = serde_json::from_str(json)?;
    assert!(matches!(frame, ExtensionFrame::Unknown));
    Ok(())
}

// ── actions ───────────────────────────────────────────────────────────

#[test]
fn unknown_action_kind_is_rejected() {
    let json = r#"{"kind":"evaluate","script":"1+1"}"#;
    assert!(serde_json::from_str::<Action>(json).is_err());
}

#[test]
fn navigate_wait_until_parses_lowercase() -> anyhow::Result<()> {
    let json = r#"{"kind":"navigate","url":"https://example.test","waitUntil":"domcontentloaded"}"#;
    let action: Action = serde_json::from_str(json)?;
    match action {
        Action::Navigate { url, wait_until } => {
            assert_eq!(url, "https://example.test");
            assert_eq!(wait_until, Some(WaitUntil::Domcontentloaded));
        }
        other => panic!("unexpected action: {other:?}"),
    }
    Ok(())
}

#[test]
fn scroll_requires_direction() {
    let json = r#"{"kind":"scroll","amount":100}"#;
    assert!(serde_json::from_str::<Action>(json).is_err());
}

#[test]
fn click_without_target_fails_validation() {
    let action = Action::Click { selector: None, coordinates: None, button: None, modifiers: None };
    assert!(action.validate().is_err());

    let ok = Action::Click {
        selector: None,
        coordinates: Some(Coordinates { x: 10.0, y: 20.0 }),
        button: Some(MouseButton::Left),
        modifiers: Some(vec![KeyModifier::Ctrl]),
    };
    assert!(ok.validate().is_ok());
}

#[test]
fn screenshot_clip_is_forwarded_in_command_frame() -> anyhow::Result<()> {
    let frame = ServerFrame::Command {
        id: 11,
        tab_id: "t1".to_owned(),
        timeout_ms: 5000,
        action: Action::Screenshot {
            full_page: None,
            clip: Some(ClipRect { x: 10, y: 20, w: 300, h: 400 }),
            quality: None,
            format: Some(ImageFormat::Png),
        },
    };
    let value = serde_json::to_value(&frame)?;
    assert_eq!(value["action"]["kind"], "screenshot");
    assert_eq!(value["action"]["clip"]["x"], 10);
    assert_eq!(value["action"]["clip"]["y"], 20);
    assert_eq!(value["action"]["clip"]["w"], 300);
    assert_eq!(value["action"]["clip"]["h"], 400);
    Ok(())
}

#[test]
fn screenshot_clip_parses_from_request_json() -> anyhow::Result<()> {
    let json = r#"{"kind":"screenshot","clip":{"x":0,"y":0,"w":1280,"h":720}}"#;
    let action: Action = serde_json::from_str(json)?;
    match action {
        Action::Screenshot { clip: Some(clip), .. } => {
            assert_eq!((clip.x, clip.y, clip.w, clip.h), (0, 0, 1280, 720));
        }
        other => panic!("unexpected action: {other:?}"),
    }
    Ok(())
}

#[test]
fn screenshot_format_round_trips() -> anyhow::Result<()> {
    let json = r#"{"kind":"screenshot","fullPage":true,"format":"jpeg","quality":80}"#;
    let action: Action = serde_json::from_str(json)?;
    match action {
        Action::Screenshot { full_page, format, quality, .. } => {
            assert_eq!(full_page, Some(true));
            assert_eq!(format, Some(ImageFormat::Jpeg));
            assert_eq!(quality, Some(80));
        }
        other => panic!("unexpected action: {other:?}"),
    }
    Ok(())
}

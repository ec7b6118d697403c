// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn record(id: i64, name: &str) -> ApiToken {
    ApiToken {
        id,
        name: name.to_owned(),
        rpm_limit: 60,
        created_at: 1_700_000_000,
        last_used_at: None,
        revoked_at: None,
    }
}

// ── create ────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_prints_plaintext_exactly_once_with_warning() -> anyhow::Result<()> {
    let store = TokenStore::open_in_memory()?;
    let (plaintext, created) = store.create("agent", 100).await?;

    let out = render_create(&plaintext, &created);
    assert_eq!(out.matches(&plaintext).count(), 1);
    assert!(out.contains(&format!("#{}", created.id)));
    assert!(out.contains("(agent), 100 requests/minute"));
    assert!(out.contains("Save it now"));
    Ok(())
}

// ── list ──────────────────────────────────────────────────────────────

#[test]
fn empty_list_suggests_create() {
    let out = render_list(&[]);
    assert!(out.contains("No tokens"));
    assert!(out.contains("token create"));
}

#[test]
fn list_is_columnar_with_status_and_placeholders() {
    let mut active = record(1, "agent");
    active.last_used_at = Some(1_700_000_300);
    let mut revoked = record(2, "old-agent");
    revoked.revoked_at = Some(1_700_000_600);

    let out = render_list(&[active, revoked]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);

    // Header and rows share fixed column offsets.
    let header = lines[0];
    assert!(header.starts_with("ID"));
    let name_col = header.find("NAME").expect("NAME column");
    let status_col = header.find("STATUS").expect("STATUS column");
    assert_eq!(&lines[1][name_col..name_col + 5], "agent");
    assert_eq!(&lines[1][status_col..], "active");
    assert_eq!(&lines[2][status_col..], "revoked");

    // Never-used tokens show a placeholder, stamped ones a timestamp.
    assert!(lines[2].contains(" - "));
    assert!(lines[1].contains("2023-"));
}

#[test]
fn list_never_contains_digests() {
    let plaintext = crate::store::generate_token();
    let digest = crate::store::token_digest(&plaintext);

    let out = render_list(&[record(1, "agent")]);
    assert!(!out.contains(&digest));
    // Nothing 64-hex-shaped leaks into the listing at all.
    assert!(!out
        .split_whitespace()
        .any(|w| w.len() == 64 && w.chars().all(|c| c.is_ascii_hexdigit())));
}

#[test]
fn format_epoch_handles_missing_and_known_values() {
    assert_eq!(format_epoch(None), "-");
    // 2023-11-14 22:13:20 UTC
    assert_eq!(format_epoch(Some(1_700_000_000)), "2023-11-14 22:13");
}

// ── revoke ────────────────────────────────────────────────────────────

#[tokio::test]
async fn revoke_then_list_shows_revoked_status() -> anyhow::Result<()> {
    let store = TokenStore::open_in_memory()?;
    let (_, created) = store.create("agent", 60).await?;

    token_revoke(&store, created.id).await?;

    let listed = store.list().await?;
    let out = render_list(&listed);
    assert!(out.contains("revoked"));
    assert!(!out.contains("active"));
    Ok(())
}

#[tokio::test]
async fn revoke_unknown_or_repeated_id_is_an_error() -> anyhow::Result<()> {
    let store = TokenStore::open_in_memory()?;
    let (_, created) = store.create("agent", 60).await?;

    assert!(token_revoke(&store, 999).await.is_err());
    token_revoke(&store, created.id).await?;
    let err = token_revoke(&store, created.id).await.expect_err("second revoke fails");
    assert!(err.to_string().contains("not found or already revoked"));
    Ok(())
}

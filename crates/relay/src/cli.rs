// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token management subcommands.

use std::fmt::Write;
use std::path::PathBuf;

use crate::store::{ApiToken, TokenStore};

/// Store location shared by all token subcommands.
#[derive(Debug, Clone, clap::Args)]
pub struct StoreArgs {
    /// Path to the token database.
    #[arg(long = "db", default_value = "tabrelay.db", env = "RELAY_DB_PATH")]
    pub db_path: PathBuf,
}

/// `token create [name]` — print the plaintext exactly once.
pub async fn token_create(store: &TokenStore, name: Option<String>, rpm: u32) -> anyhow::Result<()> {
    let name = name.unwrap_or_else(|| "default".to_owned());
    let (plaintext, record) = store.create(&name, rpm).await?;
    print!("{}", render_create(&plaintext, &record));
    Ok(())
}

/// `token list` — columnar listing, digests never shown.
pub async fn token_list(store: &TokenStore) -> anyhow::Result<()> {
    let tokens = store.list().await?;
    print!("{}", render_list(&tokens));
    Ok(())
}

/// `token revoke <id>`.
pub async fn token_revoke(store: &TokenStore, id: i64) -> anyhow::Result<()> {
    if store.revoke(id).await? {
        println!("Revoked token #{id}");
        Ok(())
    } else {
        anyhow::bail!("token #{id} not found or already revoked")
    }
}

fn render_create(plaintext: &str, record: &ApiToken) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Created token #{} ({}), {} requests/minute",
        record.id, record.name, record.rpm_limit
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "    {plaintext}");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Save it now. The plaintext is shown only this once; the relay keeps a digest."
    );
    out
}

fn render_list(tokens: &[ApiToken]) -> String {
    if tokens.is_empty() {
        return "No tokens. Create one with: tabrelay token create <name>\n".to_owned();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<20} {:>6}  {:<17} {:<17} {}",
        "ID", "NAME", "RPM", "CREATED", "LAST USED", "STATUS"
    );
    for token in tokens {
        let status = if token.revoked_at.is_some() { "revoked" } else { "active" };
        let _ = writeln!(
            out,
            "{:<6} {:<20} {:>6}  {:<17} {:<17} {}",
            token.id,
            token.name,
            token.rpm_limit,
            format_epoch(Some(token.created_at)),
            format_epoch(token.last_used_at),
            status
        );
    }
    out
}

fn format_epoch(secs: Option<i64>) -> String {
    match secs.and_then(|s| chrono::DateTime::from_timestamp(s, 0)) {
        Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_owned(),
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

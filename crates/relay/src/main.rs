// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use tabrelay::cli::{self, StoreArgs};
use tabrelay::config::RelayConfig;
use tabrelay::store::TokenStore;

#[derive(Parser)]
#[command(name = "tabrelay", version, about = "Relay bridging API agents to live browser sessions.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the relay server.
    Serve(RelayConfig),
    /// Manage API tokens.
    #[command(subcommand)]
    Token(TokenCommand),
    /// Print the version.
    Version,
}

#[derive(clap::Subcommand)]
enum TokenCommand {
    /// Create a token and print its plaintext exactly once.
    Create {
        /// Display name for the token.
        name: Option<String>,
        /// Requests-per-minute limit.
        #[arg(long, default_value_t = 60, env = "RELAY_DEFAULT_RPM")]
        rpm: u32,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// List tokens. Digests are never shown.
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Revoke a token by id.
    Revoke {
        id: i64,
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are successes; anything else is a usage error.
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    match cli.command {
        Command::Serve(config) => {
            if let Err(e) = tabrelay::run(config).await {
                error!("fatal: {e:#}");
                std::process::exit(1);
            }
        }
        Command::Token(command) => {
            if let Err(e) = run_token(command).await {
                eprintln!("error: {e:#}");
                std::process::exit(1);
            }
        }
        Command::Version => {
            println!("tabrelay {}", env!("CARGO_PKG_VERSION"));
        }
    }
}

async fn run_token(command: TokenCommand) -> anyhow::Result<()> {
    match command {
        TokenCommand::Create { name, rpm, store } => {
            let store = TokenStore::open(&store.db_path)?;
            cli::token_create(&store, name, rpm).await
        }
        TokenCommand::List { store } => {
            let store = TokenStore::open(&store.db_path)?;
            cli::token_list(&store).await
        }
        TokenCommand::Revoke { id, store } => {
            let store = TokenStore::open(&store.db_path)?;
            cli::token_revoke(&store, id).await
        }
    }
}

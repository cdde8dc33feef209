//! Tutorium Rewards CLI - demo walkthrough and token tools.
//!
//! # Usage
//!
//! ```bash
//! # Walk the full cart -> order -> fulfilment flow in process
//! tutorium demo
//!
//! # Mint an access token for local testing
//! tutorium token issue -u tg-1001 -r student
//!
//! # Inspect a token
//! tutorium token verify <token>
//! ```
//!
//! # Commands
//!
//! - `demo` - Run an end-to-end order lifecycle against a fresh engine
//! - `token issue` / `token verify` - Access token tooling

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tutorium")]
#[command(author, version, about = "Tutorium Rewards CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full order lifecycle against an in-memory engine
    Demo,
    /// Issue and inspect access tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a token for a user id and role
    Issue {
        /// User id the token is bound to
        #[arg(short, long)]
        user: String,

        /// Role (`student`, `staff`, `admin`)
        #[arg(short, long, default_value = "student")]
        role: String,
    },
    /// Verify a token and print its claims
    Verify {
        /// The token to verify
        token: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Demo => commands::demo::run().await?,
        Commands::Token { action } => match action {
            TokenAction::Issue { user, role } => commands::token::issue(&user, &role)?,
            TokenAction::Verify { token } => commands::token::verify(&token)?,
        },
    }
    Ok(())
}

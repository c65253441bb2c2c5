//! Stride CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run ledger database migrations
//! stride-cli migrate
//!
//! # Mint a development bearer token
//! stride-cli token issue --user 1 --role member
//!
//! # Seed the database with demo data
//! stride-cli seed
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stride-cli")]
#[command(author, version, about = "Stride Rewards CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ledger database migrations
    Migrate,
    /// Mint development bearer tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Seed the database with demo users, catalog items, and an institute
    Seed,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a signed bearer token
    Issue {
        /// User id the token authenticates
        #[arg(short, long)]
        user: i32,

        /// Role claim (`member`, `admin`)
        #[arg(short, long, default_value = "member")]
        role: String,

        /// Token lifetime in hours
        #[arg(short, long, default_value_t = 24)]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stride_cli=info,sqlx=warn".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Token {
            action: TokenAction::Issue {
                user,
                role,
                ttl_hours,
            },
        } => commands::token::issue(user, &role, ttl_hours),
        Commands::Seed => commands::seed::run().await,
    };

    if let Err(error) = result {
        tracing::error!(%error, "command failed");
        std::process::exit(1);
    }
}

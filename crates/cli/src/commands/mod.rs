//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod token;

use thiserror::Error;

use stride_engine::store::StoreError;

/// Errors shared by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Read a required environment variable as a secret.
fn require_secret(name: &'static str) -> Result<secrecy::SecretString, CliError> {
    std::env::var(name)
        .map(secrecy::SecretString::from)
        .map_err(|_| CliError::MissingEnvVar(name))
}

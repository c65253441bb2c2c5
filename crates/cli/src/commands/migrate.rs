//! Database migration command.
//!
//! # Environment Variables
//!
//! - `STRIDE_DATABASE_URL` - `PostgreSQL` connection string

use super::{CliError, require_secret};

/// Run the embedded ledger migrations.
pub async fn run() -> Result<(), CliError> {
    let database_url = require_secret("STRIDE_DATABASE_URL")?;

    tracing::info!("Connecting to ledger database...");
    let pool = stride_api::db::create_pool(&database_url).await?;

    tracing::info!("Running ledger migrations...");
    stride_api::db::migrator().run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}

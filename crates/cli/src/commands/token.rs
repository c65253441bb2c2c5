//! Development bearer-token minting.
//!
//! Production tokens come from the identity service; this command exists so
//! local clients can call the API without standing that service up.
//!
//! # Environment Variables
//!
//! - `STRIDE_AUTH_SECRET` - HMAC secret shared with the API

use chrono::{Duration, Utc};

use stride_core::{Role, UserId};

use super::{CliError, require_secret};

/// Mint and print a signed bearer token.
#[allow(clippy::print_stdout)]
pub fn issue(user: i32, role: &str, ttl_hours: i64) -> Result<(), CliError> {
    let secret = require_secret("STRIDE_AUTH_SECRET")?;
    let role = Role::parse(role)
        .ok_or_else(|| CliError::InvalidArg(format!("unknown role {role:?}")))?;
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let token = stride_api::auth::mint_token(&secret, UserId::new(user), role, expires_at);
    println!("{token}");
    Ok(())
}

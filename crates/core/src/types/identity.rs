//! Caller identity as resolved by the external identity boundary.
//!
//! The engine never authenticates anyone. The API layer verifies an opaque
//! bearer token and hands the engine an [`Identity`]; the engine only
//! consults the role for capability checks (admin grants, order lifecycle).

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Role carried by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A regular member of the loyalty program.
    #[default]
    Member,
    /// Back-office operator with grant and order-lifecycle capabilities.
    Admin,
}

impl Role {
    /// Stable string form used in tokens.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }

    /// Parse the token string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user identifier supplied by the identity provider.
    pub user_id: UserId,
    /// Capability role.
    pub role: Role,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// A regular member identity.
    #[must_use]
    pub const fn member(user_id: UserId) -> Self {
        Self::new(user_id, Role::Member)
    }

    /// An administrative identity.
    #[must_use]
    pub const fn admin(user_id: UserId) -> Self {
        Self::new(user_id, Role::Admin)
    }

    /// Whether the caller carries the administrative capability.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

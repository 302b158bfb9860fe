use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account role. Closed set; stored in Postgres as the `user_role` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// The resolved caller derived from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
}

/// Single mutation rule for owned resources: admins may touch anything,
/// everyone else only what they authored.
pub fn can_mutate(identity: Identity, author_id: Uuid) -> bool {
    identity.role == Role::Admin || identity.id == author_id
}

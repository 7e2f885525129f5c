//! User Entity
//!
//! A registered account: profile plus stored credential.

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;

use crate::domain::value_object::{
    display_name::DisplayName, email::Email, user_id::UserId, user_role::UserRole,
};

/// User entity
///
/// Never serialized as-is. The HTTP layer exposes a separate projection
/// without `password_hash`.
#[derive(Debug, Clone)]
pub struct User {
    /// Internal UUID identifier (token subject)
    pub user_id: UserId,
    /// Display name
    pub name: DisplayName,
    /// Login identifier (unique, canonical form)
    pub email: Email,
    /// Argon2id PHC string
    pub password_hash: HashedPassword,
    /// Role (User, Admin)
    pub user_role: UserRole,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(
        name: DisplayName,
        email: Email,
        password_hash: HashedPassword,
        user_role: UserRole,
    ) -> Self {
        Self {
            user_id: UserId::new(),
            name,
            email,
            password_hash,
            user_role,
            created_at: Utc::now(),
        }
    }
}

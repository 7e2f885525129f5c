//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entity::user::User;
use crate::domain::value_object::{email::Email, user_id::UserId};
use crate::error::AuthResult;

/// Credential store
///
/// Email uniqueness is enforced here, not by callers: `insert` must fail
/// with [`AuthError::DuplicateEmail`](crate::error::AuthError::DuplicateEmail)
/// if the email is taken, even when two inserts race.
#[trait_variant::make(CredentialStore: Send)]
pub trait LocalCredentialStore {
    /// Find user by canonical email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Find user by ID
    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    /// Insert a new user
    async fn insert(&self, user: &User) -> AuthResult<()>;
}

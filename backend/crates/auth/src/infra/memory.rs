//! In-Memory Credential Store
//!
//! Used in development (no `DATABASE_URL`) and in tests. Data is lost on
//! restart.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::domain::entity::user::User;
use crate::domain::repository::CredentialStore;
use crate::domain::value_object::{email::Email, user_id::UserId};
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    /// Canonical email -> user. The entry API makes insert atomic per email.
    by_email: DashMap<String, User>,
    by_id: DashMap<UserId, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        Ok(self.by_email.get(email.as_str()).map(|u| u.clone()))
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        // Copy the key out so the first shard guard is released before the second lookup
        let email = self.by_id.get(user_id).map(|e| e.clone());
        Ok(email.and_then(|e| self.by_email.get(&e).map(|u| u.clone())))
    }

    async fn insert(&self, user: &User) -> AuthResult<()> {
        match self.by_email.entry(user.email.as_str().to_string()) {
            Entry::Occupied(_) => Err(AuthError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                self.by_id.insert(user.user_id, user.email.as_str().to_string());
                Ok(())
            }
        }
    }
}

//! Sign In Use Case
//!
//! Authenticates a user and issues an identity token.

use std::sync::Arc;

use platform::password::{ClearTextPassword, PasswordHasher};

use crate::application::password::verify_password;
use crate::application::token_service::TokenService;
use crate::domain::entity::user::User;
use crate::domain::repository::CredentialStore;
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Sign in input
#[derive(Debug)]
pub struct SignInInput {
    pub email: Email,
    pub password: ClearTextPassword,
}

/// Sign in output
#[derive(Debug)]
pub struct SignInOutput {
    pub user: User,
    /// Identity token for the session cookie
    pub token: String,
}

/// Sign in use case
pub struct SignInUseCase<S>
where
    S: CredentialStore,
{
    store: Arc<S>,
    hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenService>,
}

impl<S> SignInUseCase<S>
where
    S: CredentialStore,
{
    pub fn new(store: Arc<S>, hasher: Arc<PasswordHasher>, tokens: Arc<TokenService>) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutput> {
        let user = self.store.find_by_email(&input.email).await?;

        // Unknown email still pays for one verification
        let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
        let password_valid = verify_password(self.hasher.clone(), input.password, stored_hash).await?;

        let user = match user {
            Some(user) if password_valid => user,
            _ => return Err(AuthError::InvalidCredentials),
        };

        if user.password_hash.needs_rehash() {
            tracing::info!(user_id = %user.user_id, "Stored password hash uses outdated parameters");
        }

        let token = self.tokens.sign(&user)?;

        tracing::info!(user_id = %user.user_id, role = %user.user_role, "User signed in");

        Ok(SignInOutput { user, token })
    }
}

//! Sign Up Use Case
//!
//! Creates a new user account.

use std::sync::Arc;

use platform::password::{ClearTextPassword, PasswordHasher};

use crate::application::password::hash_password;
use crate::domain::entity::user::User;
use crate::domain::repository::CredentialStore;
use crate::domain::value_object::{
    display_name::DisplayName, email::Email, user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Sign up input (already validated)
#[derive(Debug)]
pub struct SignUpInput {
    pub name: DisplayName,
    pub email: Email,
    pub password: ClearTextPassword,
    pub role: UserRole,
}

/// Sign up use case
pub struct SignUpUseCase<S>
where
    S: CredentialStore,
{
    store: Arc<S>,
    hasher: Arc<PasswordHasher>,
}

impl<S> SignUpUseCase<S>
where
    S: CredentialStore,
{
    pub fn new(store: Arc<S>, hasher: Arc<PasswordHasher>) -> Self {
        Self { store, hasher }
    }

    /// `requester_role` is the role of the caller's valid token, if any.
    pub async fn execute(
        &self,
        input: SignUpInput,
        requester_role: Option<UserRole>,
    ) -> AuthResult<User> {
        authorize_role_assignment(input.role, requester_role)?;

        // Fast path only; the store's constraint decides under races
        if self.store.find_by_email(&input.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_password(self.hasher.clone(), input.password).await?;

        let user = User::new(input.name, input.email, password_hash, input.role);

        self.store.insert(&user).await?;

        tracing::info!(
            user_id = %user.user_id,
            role = %user.user_role,
            "User signed up"
        );

        Ok(user)
    }
}

/// Anyone may create a `user`; only an admin may create an `admin`.
pub fn authorize_role_assignment(
    requested: UserRole,
    requester_role: Option<UserRole>,
) -> AuthResult<()> {
    match requested {
        UserRole::User => Ok(()),
        UserRole::Admin if requester_role.is_some_and(|r| r.is_admin()) => Ok(()),
        UserRole::Admin => {
            tracing::warn!(requester_role = ?requester_role, "Admin role self-assignment refused");
            Err(AuthError::RoleAssignmentForbidden)
        }
    }
}

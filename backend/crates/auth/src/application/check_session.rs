//! Check Session Use Case
//!
//! Resolves the caller's identity from the token in the session cookie.

use std::sync::Arc;

use crate::application::token_service::TokenService;
use crate::domain::entity::user::User;
use crate::domain::repository::CredentialStore;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Verified identity of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: String,
    pub role: UserRole,
    /// Token expiry (Unix seconds)
    pub expires_at: i64,
}

/// Session status output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub context: Option<AuthContext>,
}

/// Check session use case
pub struct CheckSessionUseCase {
    tokens: Arc<TokenService>,
}

impl CheckSessionUseCase {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Verify a token and build the request identity
    pub fn authenticate(&self, token: Option<&str>) -> AuthResult<AuthContext> {
        let token = token.ok_or(AuthError::InvalidToken)?;
        let claims = self.tokens.verify(token)?;

        Ok(AuthContext {
            user_id: claims.user_id()?,
            email: claims.email,
            role: claims.role,
            expires_at: claims.exp,
        })
    }

    /// Like [`authenticate`](Self::authenticate) but never fails
    pub fn status(&self, token: Option<&str>) -> SessionStatus {
        let context = self.authenticate(token).ok();
        SessionStatus {
            authenticated: context.is_some(),
            context,
        }
    }
}

/// Load the account behind a verified identity
///
/// A token for a deleted account is as good as no token.
pub async fn load_current_user<S>(store: &S, context: &AuthContext) -> AuthResult<User>
where
    S: CredentialStore,
{
    store
        .find_by_id(&context.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)
}

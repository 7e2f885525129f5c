//! Sign Out Use Case
//!
//! Tokens are stateless, so signing out only means the caller's cookie is
//! cleared. A token copied elsewhere stays valid until it expires.

use std::sync::Arc;

use crate::application::token_service::TokenService;
use crate::domain::value_object::user_id::UserId;

/// Sign out use case
pub struct SignOutUseCase {
    tokens: Arc<TokenService>,
}

impl SignOutUseCase {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Never fails. Returns the subject if a valid token was presented.
    pub fn execute(&self, token: Option<&str>) -> Option<UserId> {
        let user_id = token
            .and_then(|t| self.tokens.verify(t).ok())
            .and_then(|claims| claims.user_id().ok());

        match &user_id {
            Some(user_id) => tracing::info!(user_id = %user_id, "User signed out"),
            None => tracing::debug!("Sign out without a valid token"),
        }

        user_id
    }
}

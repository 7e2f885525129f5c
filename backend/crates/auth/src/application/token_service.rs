//! Identity Token Service
//!
//! Issues and verifies the signed token carried in the session cookie.
//! Tokens are stateless: expiry is the only way one stops being valid.

use std::time::Duration;

use platform::token::{TokenError, TokenKeys, unix_now};
use serde::{Deserialize, Serialize};

use crate::application::config::{AuthConfig, MAX_TOKEN_TTL};
use crate::domain::entity::user::User;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Claims carried by an identity token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// User ID
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

impl IdentityClaims {
    pub fn user_id(&self) -> AuthResult<UserId> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

pub struct TokenService {
    keys: TokenKeys,
    ttl_secs: i64,
}

impl TokenService {
    /// Fails on a weak secret or a lifetime outside `1s..=MAX_TOKEN_TTL`
    pub fn new(secret: &[u8], ttl: Duration) -> AuthResult<Self> {
        let keys = TokenKeys::from_secret(secret).map_err(|e| AuthError::Internal(e.to_string()))?;

        if ttl.as_secs() == 0 || ttl > MAX_TOKEN_TTL {
            return Err(AuthError::Internal(format!(
                "Token lifetime must be between 1 and {} seconds (got {})",
                MAX_TOKEN_TTL.as_secs(),
                ttl.as_secs()
            )));
        }
        let ttl_secs = i64::try_from(ttl.as_secs())
            .map_err(|_| AuthError::Internal("Token lifetime out of range".to_string()))?;

        Ok(Self { keys, ttl_secs })
    }

    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        Self::new(&config.token_secret, config.token_ttl)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn sign(&self, user: &User) -> AuthResult<String> {
        self.sign_at(user, unix_now())
    }

    /// Sign with an explicit issue time
    pub fn sign_at(&self, user: &User, issued_at: i64) -> AuthResult<String> {
        let exp = issued_at
            .checked_add(self.ttl_secs)
            .ok_or_else(|| AuthError::Internal("Token expiry overflows".to_string()))?;

        let claims = IdentityClaims {
            sub: user.user_id.to_string(),
            email: user.email.to_string(),
            role: user.user_role,
            iat: issued_at,
            exp,
        };

        self.keys
            .sign(&claims)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Every failure (signature, structure, algorithm, expiry) is `InvalidToken`
    pub fn verify(&self, token: &str) -> AuthResult<IdentityClaims> {
        let claims: IdentityClaims = self.keys.verify(token).map_err(|e| {
            match e {
                TokenError::Expired => tracing::debug!("Expired identity token"),
                _ => tracing::debug!(error = %e, "Rejected identity token"),
            }
            AuthError::InvalidToken
        })?;

        // Subject must be a user id, not just any string
        claims.user_id()?;
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("keys", &self.keys)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

//! Password hashing on the blocking pool
//!
//! Argon2id takes tens of milliseconds of CPU and ~19 MiB of memory per
//! call, so it must not run on an async worker thread.

use std::sync::Arc;

use platform::password::{ClearTextPassword, HashedPassword, PasswordHasher};

use crate::error::{AuthError, AuthResult};

pub async fn hash_password(
    hasher: Arc<PasswordHasher>,
    password: ClearTextPassword,
) -> AuthResult<HashedPassword> {
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AuthError::Internal(format!("Hashing task failed: {e}")))?
        .map_err(AuthError::from)
}

/// `None` verifies against a dummy hash and returns `false`
pub async fn verify_password(
    hasher: Arc<PasswordHasher>,
    password: ClearTextPassword,
    hashed: Option<HashedPassword>,
) -> AuthResult<bool> {
    tokio::task::spawn_blocking(move || match hashed {
        Some(hashed) => hasher.verify(&password, &hashed),
        None => hasher.verify_dummy(&password),
    })
    .await
    .map_err(|e| AuthError::Internal(format!("Verification task failed: {e}")))
}

//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, credential store trait
//! - `application/` - Use cases, token service, admission gate
//! - `infra/` - Credential store implementations (PostgreSQL, in-memory)
//! - `presentation/` - HTTP handlers, DTOs, validation, router, middleware
//!
//! ## Features
//! - User signup/signin with email + password
//! - Stateless identity tokens (HS256) in an HttpOnly session cookie
//! - Role-based access (User, Admin)
//! - Admission control: bot detection, attack-pattern shield and a
//!   per-role sliding-window rate limit in front of every route
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Unknown email and wrong password are indistinguishable
//! - Admin accounts can only be created by an admin
//! - No server-side revocation: signing out clears the cookie and a token
//!   stays valid until it expires

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::{AuthConfig, Environment, FailMode, RoleRateLimits};
pub use error::{AuthError, AuthResult};
pub use infra::{memory::MemoryCredentialStore, postgres::PgCredentialStore};
pub use presentation::router::{auth_router, auth_router_generic};
pub use presentation::AuthAppState;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

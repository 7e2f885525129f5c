//! Application Layer
//!
//! Use cases and application services.

pub mod admission;
pub mod check_session;
pub mod config;
pub mod password;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod token_service;

// Re-exports
pub use admission::{AdmissionDecision, AdmissionGate, Caller, RejectReason};
pub use check_session::{AuthContext, CheckSessionUseCase, SessionStatus, load_current_user};
pub use config::{AuthConfig, Environment, FailMode, RoleRateLimits};
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpUseCase, authorize_role_assignment};
pub use token_service::{IdentityClaims, TokenService};

//! Presentation Layer
//!
//! HTTP handlers, DTOs, validation, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod session_cookie;
pub mod validation;

pub use handlers::AuthAppState;
pub use middleware::{CurrentUser, MaybeCurrentUser, RoleGuard, admission, require_role};
pub use router::{auth_router, auth_router_generic};
pub use session_cookie::SessionCookieManager;

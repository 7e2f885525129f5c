//! Auth Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use platform::rate_limit::{InMemoryRateLimitStore, RateLimitStore};

use crate::application::config::AuthConfig;
use crate::domain::repository::CredentialStore;
use crate::error::AuthResult;
use crate::infra::postgres::PgCredentialStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::admission;

/// Create the Auth router with PostgreSQL store and in-process rate limiter
pub fn auth_router(
    store: PgCredentialStore,
    limiter: Arc<InMemoryRateLimitStore>,
    config: AuthConfig,
) -> AuthResult<Router> {
    let state = AuthAppState::new(Arc::new(store), limiter, config)?;
    Ok(auth_router_generic(state))
}

/// Create a generic Auth router for any store / limiter implementation
///
/// Every route except `/signout` sits behind the admission middleware.
/// Signout only clears a cookie, and a throttled or flagged client must
/// still be able to drop its session.
pub fn auth_router_generic<S, L>(state: AuthAppState<S, L>) -> Router
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    Router::new()
        .route("/signup", post(handlers::sign_up::<S, L>))
        .route("/signin", post(handlers::sign_in::<S, L>))
        .route("/status", get(handlers::session_status::<S, L>))
        .route("/me", get(handlers::me::<S, L>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission::<S, L>,
        ))
        .route("/signout", post(handlers::sign_out::<S, L>))
        .with_state(state)
}

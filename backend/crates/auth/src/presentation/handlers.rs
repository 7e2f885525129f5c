//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use kernel::error::field::FieldError;
use platform::password::PasswordHasher;
use platform::rate_limit::RateLimitStore;

use crate::application::admission::AdmissionGate;
use crate::application::config::AuthConfig;
use crate::application::{
    CheckSessionUseCase, SignInUseCase, SignOutUseCase, SignUpUseCase, TokenService,
    load_current_user,
};
use crate::domain::repository::CredentialStore;
use crate::domain::value_object::user_role::UserRole;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{SessionStatusResponse, SignInRequest, SignUpRequest, UserResponse};
use crate::presentation::middleware::{CurrentUser, MaybeCurrentUser, RoleGuard};
use crate::presentation::session_cookie::SessionCookieManager;
use crate::presentation::validation::{validate_sign_in, validate_sign_up};

/// Shared state for auth handlers
pub struct AuthAppState<S, L>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    pub store: Arc<S>,
    pub hasher: Arc<PasswordHasher>,
    pub tokens: Arc<TokenService>,
    pub gate: Arc<AdmissionGate<L>>,
    pub cookies: SessionCookieManager,
    pub config: Arc<AuthConfig>,
}

impl<S, L> AuthAppState<S, L>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    /// Wire up hasher, token service, admission gate and cookie manager
    ///
    /// Fails if the token secret is unusable.
    pub fn new(store: Arc<S>, limiter: Arc<L>, config: AuthConfig) -> AuthResult<Self> {
        let tokens = TokenService::from_config(&config)?;
        let gate = AdmissionGate::new(limiter, config.rate_limits.clone(), config.fail_mode);

        Ok(Self::from_parts(store, tokens, gate, config))
    }

    /// Same as [`new`](Self::new) with a caller-built gate
    pub fn from_parts(
        store: Arc<S>,
        tokens: TokenService,
        gate: AdmissionGate<L>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            hasher: Arc::new(PasswordHasher::new(config.password_pepper.clone())),
            tokens: Arc::new(tokens),
            gate: Arc::new(gate),
            cookies: SessionCookieManager::from_auth_config(&config),
            config: Arc::new(config),
        }
    }

    /// State for a [`require_role`](crate::presentation::middleware::require_role) layer
    pub fn role_guard(&self, required: UserRole) -> RoleGuard {
        RoleGuard {
            tokens: self.tokens.clone(),
            cookies: self.cookies.clone(),
            required,
        }
    }
}

// Manual impl: a derive would require `S: Clone` and `L: Clone`
impl<S, L> Clone for AuthAppState<S, L>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hasher: self.hasher.clone(),
            tokens: self.tokens.clone(),
            gate: self.gate.clone(),
            cookies: self.cookies.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, L> FromRef<AuthAppState<S, L>> for Arc<TokenService>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    fn from_ref(state: &AuthAppState<S, L>) -> Self {
        state.tokens.clone()
    }
}

impl<S, L> FromRef<AuthAppState<S, L>> for SessionCookieManager
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    fn from_ref(state: &AuthAppState<S, L>) -> Self {
        state.cookies.clone()
    }
}

fn body_error(rejection: JsonRejection) -> AuthError {
    AuthError::Validation(vec![FieldError::new("body", rejection.body_text())])
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /api/auth/signup
pub async fn sign_up<S, L>(
    State(state): State<AuthAppState<S, L>>,
    MaybeCurrentUser(requester): MaybeCurrentUser,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let Json(req) = payload.map_err(body_error)?;
    let input = validate_sign_up(req)?;

    let use_case = SignUpUseCase::new(state.store.clone(), state.hasher.clone());
    let user = use_case
        .execute(input, requester.map(|context| context.role))
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

// ============================================================================
// Sign In
// ============================================================================

/// POST /api/auth/signin
pub async fn sign_in<S, L>(
    State(state): State<AuthAppState<S, L>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> AuthResult<Response>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let Json(req) = payload.map_err(body_error)?;
    let input = validate_sign_in(req)?;

    let use_case = SignInUseCase::new(
        state.store.clone(),
        state.hasher.clone(),
        state.tokens.clone(),
    );
    let output = use_case.execute(input).await?;

    let mut response = (StatusCode::OK, Json(UserResponse::from(&output.user))).into_response();
    state.cookies.set(&mut response, &output.token)?;

    Ok(response)
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /api/auth/signout
///
/// Always 204 with a deletion cookie, with or without a session.
pub async fn sign_out<S, L>(State(state): State<AuthAppState<S, L>>, headers: HeaderMap) -> Response
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let token = state.cookies.extract(&headers);
    SignOutUseCase::new(state.tokens.clone()).execute(token.as_deref());

    let mut response = StatusCode::NO_CONTENT.into_response();
    state.cookies.clear(&mut response);
    response
}

// ============================================================================
// Session Status
// ============================================================================

/// GET /api/auth/status
pub async fn session_status<S, L>(
    State(state): State<AuthAppState<S, L>>,
    headers: HeaderMap,
) -> Json<SessionStatusResponse>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let token = state.cookies.extract(&headers);
    let status = CheckSessionUseCase::new(state.tokens.clone()).status(token.as_deref());

    Json(SessionStatusResponse::from(status))
}

// ============================================================================
// Current User
// ============================================================================

/// GET /api/auth/me
pub async fn me<S, L>(
    State(state): State<AuthAppState<S, L>>,
    CurrentUser(context): CurrentUser,
) -> AuthResult<Json<UserResponse>>
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let user = load_current_user(state.store.as_ref(), &context).await?;
    Ok(Json(UserResponse::from(&user)))
}

//! Auth Middleware
//!
//! - [`admission`]: bot / shield / rate-limit gate in front of every route
//! - [`require_role`]: role guard for protected routers
//! - [`CurrentUser`] / [`MaybeCurrentUser`]: identity extractors

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRef, FromRequestParts, Request, State};
use axum::http::{HeaderMap, HeaderValue, header, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::{ClientFingerprint, extract_client_ip};
use platform::rate_limit::RateLimitStore;
use platform::shield::RequestSignals;

use crate::application::admission::{AdmissionDecision, Caller};
use crate::application::check_session::{AuthContext, CheckSessionUseCase};
use crate::application::token_service::TokenService;
use crate::domain::repository::CredentialStore;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;
use crate::presentation::session_cookie::SessionCookieManager;

/// Remaining requests in the caller's window, set on admitted responses
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

// ============================================================================
// Admission
// ============================================================================

/// Owned copy of what screening needs, so no borrow of the request is held
/// across the rate limiter's await.
struct OwnedSignals {
    method: String,
    path: String,
    query: Option<String>,
    user_agent: Option<String>,
}

impl OwnedSignals {
    fn from_request(req: &Request) -> Self {
        Self {
            method: req.method().as_str().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            user_agent: req
                .headers()
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

/// Resolve the admission identity of a request
///
/// An invalid or expired token is treated as no token: the caller is a
/// guest here, and protected handlers reject the token on their own.
/// Guests are keyed by `client_ip` alone.
pub fn resolve_caller(
    tokens: &TokenService,
    cookies: &SessionCookieManager,
    headers: &HeaderMap,
    client_ip: Option<IpAddr>,
) -> Caller {
    let token = cookies.extract(headers);

    if let Some(claims) = token.and_then(|t| tokens.verify(&t).ok()) {
        if let Ok(user_id) = claims.user_id() {
            return Caller::Member {
                user_id,
                role: claims.role,
            };
        }
    }

    Caller::Guest {
        fingerprint: ClientFingerprint::new(client_ip).key(),
    }
}

/// Client IP of a request: socket peer, or the forwarded client when the
/// peer is a trusted proxy
pub fn client_ip(req: &Request, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let peer_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    extract_client_ip(req.headers(), peer_ip, trusted_proxies)
}

/// Admission middleware
///
/// Mount with `axum::middleware::from_fn_with_state(state, admission::<S, L>)`.
pub async fn admission<S, L>(
    State(state): State<AuthAppState<S, L>>,
    req: Request,
    next: Next,
) -> Response
where
    S: CredentialStore + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let client_ip = client_ip(&req, &state.config.trusted_proxies);
    let caller = resolve_caller(&state.tokens, &state.cookies, req.headers(), client_ip);
    let signals = OwnedSignals::from_request(&req);

    let decision = state
        .gate
        .admit(
            &caller,
            &RequestSignals {
                method: &signals.method,
                path: &signals.path,
                query: signals.query.as_deref(),
                user_agent: signals.user_agent.as_deref(),
                ip: client_ip,
            },
        )
        .await;

    match decision {
        AdmissionDecision::Allow { remaining } => {
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        AdmissionDecision::Reject(reason) => {
            tracing::debug!(
                reason = reason.as_str(),
                caller = caller.role_label(),
                path = %signals.path,
                "Admission rejected"
            );
            AuthError::from(reason).into_response()
        }
    }
}

// ============================================================================
// Role guard
// ============================================================================

/// State for [`require_role`]
#[derive(Clone)]
pub struct RoleGuard {
    pub tokens: Arc<TokenService>,
    pub cookies: SessionCookieManager,
    pub required: UserRole,
}

/// 401 without a valid token, 403 with a token whose role is insufficient.
///
/// On success the verified [`AuthContext`] is stored in request extensions.
pub async fn require_role(
    State(guard): State<RoleGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = guard.cookies.extract(req.headers());
    let context = CheckSessionUseCase::new(guard.tokens.clone()).authenticate(token.as_deref())?;

    if !context.role.satisfies(guard.required) {
        tracing::warn!(
            user_id = %context.user_id,
            role = %context.role,
            required = %guard.required,
            "Insufficient role"
        );
        return Err(AuthError::InsufficientRole);
    }

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

// ============================================================================
// Extractors
// ============================================================================

/// Verified identity; rejects with 401
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthContext);

/// Verified identity if a valid token is present; never rejects
#[derive(Debug, Clone)]
pub struct MaybeCurrentUser(pub Option<AuthContext>);

fn authenticate_parts<St>(parts: &Parts, state: &St) -> Result<AuthContext, AuthError>
where
    Arc<TokenService>: FromRef<St>,
    SessionCookieManager: FromRef<St>,
{
    // Already verified by `require_role`
    if let Some(context) = parts.extensions.get::<AuthContext>() {
        return Ok(context.clone());
    }

    let tokens = Arc::<TokenService>::from_ref(state);
    let cookies = SessionCookieManager::from_ref(state);
    let token = cookies.extract(&parts.headers);

    CheckSessionUseCase::new(tokens).authenticate(token.as_deref())
}

impl<St> FromRequestParts<St> for CurrentUser
where
    St: Send + Sync,
    Arc<TokenService>: FromRef<St>,
    SessionCookieManager: FromRef<St>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        authenticate_parts(parts, state).map(CurrentUser)
    }
}

impl<St> FromRequestParts<St> for MaybeCurrentUser
where
    St: Send + Sync,
    Arc<TokenService>: FromRef<St>,
    SessionCookieManager: FromRef<St>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        Ok(MaybeCurrentUser(authenticate_parts(parts, state).ok()))
    }
}

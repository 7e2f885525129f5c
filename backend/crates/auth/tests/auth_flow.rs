//! End-to-end tests of the auth router (in-memory store and limiter)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::application::check_session::AuthContext;
use auth::domain::entity::user::User;
use auth::domain::repository::CredentialStore;
use auth::domain::value_object::{
    display_name::DisplayName, email::Email, user_role::UserRole,
};
use auth::middleware::require_role;
use auth::{AuthAppState, AuthConfig, MemoryCredentialStore, RoleRateLimits, auth_router_generic};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json, Router};
use platform::password::{ClearTextPassword, PasswordHasher};
use platform::rate_limit::InMemoryRateLimitStore;
use serde_json::{Value, json};
use tower::util::ServiceExt;

const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0";

type State = AuthAppState<MemoryCredentialStore, InMemoryRateLimitStore>;

fn state_with_limits(limits: RoleRateLimits) -> (State, Arc<MemoryCredentialStore>) {
    state_with_config(AuthConfig {
        rate_limits: limits,
        ..AuthConfig::development()
    })
}

fn state_with_config(config: AuthConfig) -> (State, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let state = AuthAppState::new(
        store.clone(),
        Arc::new(InMemoryRateLimitStore::new()),
        config,
    )
    .unwrap();
    (state, store)
}

/// Limits high enough that flow tests never hit them
fn relaxed_app() -> (Router, State, Arc<MemoryCredentialStore>) {
    let (state, store) = state_with_limits(RoleRateLimits {
        guest: 1_000,
        user: 1_000,
        admin: 1_000,
        window: Duration::from_secs(60),
    });
    (auth_router_generic(state.clone()), state, store)
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, BROWSER);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_with(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::USER_AGENT, BROWSER);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// Attach the socket address axum's `ConnectInfo` would carry
fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    request
}

fn signin_attempt(user_agent: &str, forwarded_for: &str, peer: &str) -> Request<Body> {
    let request = Request::builder()
        .method("POST")
        .uri("/signin")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, user_agent)
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(
            json!({ "email": "ann@x.com", "password": "Guess1234" }).to_string(),
        ))
        .unwrap();
    from_peer(request, peer)
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

/// `token=<jwt>` part of a Set-Cookie value, usable as a Cookie header
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().to_string()
}

async fn sign_up(app: &Router, body: Value, cookie: Option<&str>) -> Response {
    app.clone()
        .oneshot(post_json("/signup", body, cookie))
        .await
        .unwrap()
}

async fn sign_in(app: &Router, email: &str, password: &str) -> Response {
    app.clone()
        .oneshot(post_json(
            "/signin",
            json!({ "email": email, "password": password }),
            None,
        ))
        .await
        .unwrap()
}

async fn seed_admin(store: &MemoryCredentialStore) {
    let hash = PasswordHasher::default()
        .hash(&ClearTextPassword::candidate("AdminPass99".to_string()))
        .unwrap();
    let admin = User::new(
        DisplayName::new("Root").unwrap(),
        Email::new("admin@x.com").unwrap(),
        hash,
        UserRole::Admin,
    );
    store.insert(&admin).await.unwrap();
}

// ============================================================================
// Sign up
// ============================================================================

#[tokio::test]
async fn test_signup_returns_public_projection() {
    let (app, _, store) = relaxed_app();

    let response = sign_up(
        &app,
        json!({ "name": "Ann", "email": "A@X.com", "password": "Secret123" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Ann");
    assert_eq!(body["email"], "a@x.com");
    assert_eq!(body["role"], "user");
    assert!(body["id"].as_str().is_some());
    assert!(body["createdAt"].as_str().is_some());
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());
    assert!(!body.to_string().contains("argon2"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_signup_duplicate_email_conflicts() {
    let (app, _, store) = relaxed_app();
    let body = json!({ "name": "Ann", "email": "ann@x.com", "password": "Secret123" });

    assert_eq!(sign_up(&app, body.clone(), None).await.status(), StatusCode::CREATED);

    let response = sign_up(&app, body, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let problem = body_json(response).await;
    assert_eq!(problem["status"], 409);
    assert_eq!(problem["title"], "Conflict");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_signup_validation_lists_field_errors() {
    let (app, _, store) = relaxed_app();

    let response = sign_up(&app, json!({ "email": "not-an-email", "password": "short" }), None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = body_json(response).await;
    let fields: Vec<&str> = problem["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["name", "email", "password"]);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_signup_malformed_body_is_bad_request() {
    let (app, _, _) = relaxed_app();

    let request = Request::builder()
        .method("POST")
        .uri("/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, BROWSER)
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = body_json(response).await;
    assert_eq!(problem["errors"][0]["field"], "body");
}

#[tokio::test]
async fn test_admin_signup_requires_admin_session() {
    let (app, _, store) = relaxed_app();
    seed_admin(&store).await;
    let new_admin = json!({
        "name": "Second",
        "email": "second@x.com",
        "password": "Secret123",
        "role": "admin"
    });

    let response = sign_up(&app, new_admin.clone(), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin_cookie = cookie_pair(&set_cookie(&sign_in(&app, "admin@x.com", "AdminPass99").await));
    let response = sign_up(&app, new_admin, Some(&admin_cookie)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["role"], "admin");
}

// ============================================================================
// Sign in / me / status / sign out
// ============================================================================

#[tokio::test]
async fn test_full_session_flow() {
    let (app, _, _) = relaxed_app();
    sign_up(
        &app,
        json!({ "name": "Ann", "email": "ann@x.com", "password": "Secret123" }),
        None,
    )
    .await;

    let response = sign_in(&app, "ANN@x.com", "Secret123").await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie_header = set_cookie(&response);
    assert!(cookie_header.starts_with("token="));
    assert!(cookie_header.contains("HttpOnly"));
    assert!(cookie_header.contains("SameSite=Strict"));
    assert!(cookie_header.contains("Max-Age=86400"));
    assert!(!cookie_header.contains("Secure"));
    assert_eq!(body_json(response).await["email"], "ann@x.com");

    let cookie = cookie_pair(&cookie_header);

    let me = app.clone().oneshot(get_with("/me", Some(&cookie))).await.unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    let me = body_json(me).await;
    assert_eq!(me["email"], "ann@x.com");
    assert_eq!(me["role"], "user");

    let status = app
        .clone()
        .oneshot(get_with("/status", Some(&cookie)))
        .await
        .unwrap();
    let status = body_json(status).await;
    assert_eq!(status["authenticated"], true);
    assert_eq!(status["id"], me["id"]);
    assert_eq!(status["role"], "user");
    assert!(status["expiresAt"].as_i64().is_some());

    let signout = app
        .clone()
        .oneshot(post_json("/signout", json!({}), Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(signout.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie(&signout).contains("Max-Age=0"));
}

#[tokio::test]
async fn test_signin_failures_are_uniform() {
    let (app, _, _) = relaxed_app();
    sign_up(
        &app,
        json!({ "name": "Ann", "email": "ann@x.com", "password": "Secret123" }),
        None,
    )
    .await;

    let wrong_password = sign_in(&app, "ann@x.com", "Secret124").await;
    let unknown_email = sign_in(&app, "ghost@x.com", "Secret123").await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(wrong_password.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(wrong_password).await, body_json(unknown_email).await);
}

#[tokio::test]
async fn test_anonymous_requests() {
    let (app, _, _) = relaxed_app();

    let signout = app
        .clone()
        .oneshot(post_json("/signout", json!({}), None))
        .await
        .unwrap();
    assert_eq!(signout.status(), StatusCode::NO_CONTENT);
    let deletion = set_cookie(&signout);
    assert!(deletion.starts_with("token=;"));
    assert!(deletion.contains("Max-Age=0"));

    let me = app.clone().oneshot(get_with("/me", None)).await.unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let me = app
        .clone()
        .oneshot(get_with("/me", Some("token=forged.token.value")))
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);

    let status = app.clone().oneshot(get_with("/status", None)).await.unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    let status = body_json(status).await;
    assert_eq!(status["authenticated"], false);
    assert!(status["id"].is_null());
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_bots_are_rejected() {
    let (app, _, _) = relaxed_app();

    let no_agent = Request::builder()
        .uri("/status")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(no_agent).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let curl = Request::builder()
        .uri("/status")
        .header(header::USER_AGENT, "curl/8.4.0")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(curl).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_attack_patterns_are_rejected() {
    let (app, _, _) = relaxed_app();

    let response = app
        .oneshot(get_with("/status?next=%3Cscript%3Ealert(1)%3C%2Fscript%3E", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_guest_is_limited_to_five_requests_per_window() {
    let (state, _) = state_with_limits(RoleRateLimits::default());
    let app = auth_router_generic(state);

    for remaining in (0..5).rev() {
        let response = app.clone().oneshot(get_with("/status", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            remaining.to_string().as_str()
        );
    }

    let response = app.clone().oneshot(get_with("/status", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
}

// ============================================================================
// Role guard
// ============================================================================

async fn admin_only(Extension(context): Extension<AuthContext>) -> Json<Value> {
    Json(json!({ "email": context.email }))
}

#[tokio::test]
async fn test_require_role_guards_protected_routes() {
    let (auth_app, state, store) = relaxed_app();
    seed_admin(&store).await;
    sign_up(
        &auth_app,
        json!({ "name": "Ann", "email": "ann@x.com", "password": "Secret123" }),
        None,
    )
    .await;

    let protected = Router::new()
        .route("/admin", get(admin_only))
        .layer(axum::middleware::from_fn_with_state(
            state.role_guard(UserRole::Admin),
            require_role,
        ));

    let response = protected.clone().oneshot(get_with("/admin", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user_cookie = cookie_pair(&set_cookie(&sign_in(&auth_app, "ann@x.com", "Secret123").await));
    let response = protected
        .clone()
        .oneshot(get_with("/admin", Some(&user_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin_cookie =
        cookie_pair(&set_cookie(&sign_in(&auth_app, "admin@x.com", "AdminPass99").await));
    let response = protected
        .oneshot(get_with("/admin", Some(&admin_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "admin@x.com");
}

#[tokio::test]
async fn test_rotating_headers_do_not_reset_guest_limit() {
    let (state, _) = state_with_limits(RoleRateLimits::default());
    let app = auth_router_generic(state);

    for i in 0..5 {
        let request = signin_attempt(
            &format!("Mozilla/5.0 (rotation {i})"),
            &format!("10.0.0.{i}"),
            &format!("203.0.113.5:{}", 40_000 + i),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let request = signin_attempt("Mozilla/5.0 (rotation 6)", "10.0.0.99", "203.0.113.5:40100");
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different client address has its own window
    let request = signin_attempt(BROWSER, "10.0.0.1", "203.0.113.6:40000");
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trusted_proxy_forwards_rightmost_client() {
    let (state, _) = state_with_config(AuthConfig {
        trusted_proxies: vec!["127.0.0.1".parse().unwrap()],
        ..AuthConfig::development()
    });
    let app = auth_router_generic(state);
    let proxy = "127.0.0.1:50000";

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(signin_attempt(BROWSER, "198.51.100.1", proxy))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // Client-written entries left of the proxy's hop are ignored
    let spoofed = signin_attempt(BROWSER, "9.9.9.9, 198.51.100.1", proxy);
    let response = app.clone().oneshot(spoofed).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_client = signin_attempt(BROWSER, "198.51.100.2", proxy);
    let response = app.oneshot(other_client).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signout_clears_cookie_after_limit_is_spent() {
    let (state, _) = state_with_limits(RoleRateLimits::default());
    let app = auth_router_generic(state);

    for _ in 0..5 {
        let response = app.clone().oneshot(get_with("/status", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(get_with("/status", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .oneshot(post_json("/signout", json!({}), Some("token=stale")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let deletion = set_cookie(&response);
    assert!(deletion.starts_with("token=;"));
    assert!(deletion.contains("Max-Age=0"));
}

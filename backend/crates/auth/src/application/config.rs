//! Application Configuration
//!
//! Configuration for the Auth application layer. Values are parsed from the
//! environment by the API binary; this module only holds them.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use platform::cookie::{CookieConfig, SameSite};
use platform::crypto::random_bytes;
use platform::rate_limit::RateLimitConfig;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// What admission does when a stage cannot decide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    /// Allow the request and log a warning
    Open,
    /// Reject with 503
    #[default]
    Closed,
}

/// Requests per sliding window, per caller role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRateLimits {
    pub guest: u32,
    pub user: u32,
    pub admin: u32,
    pub window: Duration,
}

impl Default for RoleRateLimits {
    fn default() -> Self {
        Self {
            guest: 5,
            user: 10,
            admin: 20,
            window: Duration::from_secs(60),
        }
    }
}

impl RoleRateLimits {
    pub fn config(&self, max_requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window: self.window,
        }
    }
}

/// Longest accepted token lifetime (one year)
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Auth application configuration
#[derive(Clone)]
pub struct AuthConfig {
    pub environment: Environment,
    /// HMAC secret for identity tokens (>= 32 bytes)
    pub token_secret: Vec<u8>,
    /// Token lifetime, also the cookie Max-Age
    pub token_ttl: Duration,
    /// Session cookie name
    pub cookie_name: String,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    pub rate_limits: RoleRateLimits,
    pub fail_mode: FailMode,
    /// Reverse proxies whose `X-Forwarded-For` is believed
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            token_secret: Vec::new(),
            token_ttl: Duration::from_secs(24 * 3600), // 1 day
            cookie_name: "token".to_string(),
            cookie_same_site: SameSite::Strict,
            password_pepper: None,
            rate_limits: RoleRateLimits::default(),
            fail_mode: FailMode::Closed,
            trusted_proxies: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Create config with a random token secret (for development)
    ///
    /// Tokens do not survive a restart.
    pub fn development() -> Self {
        Self {
            token_secret: random_bytes(32),
            ..Default::default()
        }
    }

    /// Secure cookies only outside development (plain-HTTP localhost)
    pub fn cookie_secure(&self) -> bool {
        self.environment.is_production()
    }

    /// Lifetime in seconds, clamped to [`MAX_TOKEN_TTL`]
    pub fn token_ttl_secs(&self) -> i64 {
        self.token_ttl.min(MAX_TOKEN_TTL).as_secs() as i64
    }

    pub fn cookie_config(&self) -> CookieConfig {
        CookieConfig {
            name: self.cookie_name.clone(),
            secure: self.cookie_secure(),
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
            max_age_secs: Some(self.token_ttl_secs()),
        }
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("environment", &self.environment)
            .field("token_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "[REDACTED]"))
            .field("rate_limits", &self.rate_limits)
            .field("fail_mode", &self.fail_mode)
            .field("trusted_proxies", &self.trusted_proxies)
            .finish()
    }
}

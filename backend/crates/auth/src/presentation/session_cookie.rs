//! Session Cookie Manager
//!
//! The identity token travels in a single HttpOnly cookie. Attributes come
//! from [`AuthConfig::cookie_config`](crate::application::config::AuthConfig::cookie_config).

use axum::http::{HeaderMap, header};
use axum::response::Response;
use platform::cookie::{CookieConfig, delete_cookie_header, extract_cookie, set_cookie_header};

use crate::application::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
pub struct SessionCookieManager {
    config: CookieConfig,
}

impl SessionCookieManager {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    pub fn from_auth_config(config: &AuthConfig) -> Self {
        Self::new(config.cookie_config())
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Append the session cookie carrying `token`
    pub fn set(&self, response: &mut Response, token: &str) -> AuthResult<()> {
        let value = set_cookie_header(&self.config, token)
            .ok_or_else(|| AuthError::Internal("Token is not a valid cookie value".to_string()))?;
        response.headers_mut().append(header::SET_COOKIE, value);
        Ok(())
    }

    /// Append a cookie that deletes the session cookie
    pub fn clear(&self, response: &mut Response) {
        match delete_cookie_header(&self.config) {
            Some(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            None => tracing::error!(cookie = %self.config.name, "Cannot build deletion cookie"),
        }
    }

    /// Token from the request's cookie, if present
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.config.name)
    }
}

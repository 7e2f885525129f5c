//! Server configuration
//!
//! Reads the process environment once at startup. Invalid values abort
//! startup; only unset variables fall back to defaults.

use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use auth::application::config::MAX_TOKEN_TTL;
use auth::{AuthConfig, Environment, FailMode, RoleRateLimits};
use platform::crypto::{from_base64, random_bytes};
use platform::token::MIN_SECRET_BYTES;

const DEFAULT_PORT: u16 = 31113;
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:40922,http://127.0.0.1:40922";

#[derive(Debug)]
pub struct ServerConfig {
    pub auth: AuthConfig,
    /// `None` selects the in-memory credential store (development only)
    pub database_url: Option<String>,
    pub port: u16,
    pub frontend_origins: Vec<String>,
    /// True when no token secret was configured and a random one is in use
    pub ephemeral_secret: bool,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process env
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let environment = match get("APP_ENV").as_deref() {
            None | Some("development") => Environment::Development,
            Some("production") => Environment::Production,
            Some(other) => bail!("APP_ENV must be 'development' or 'production', got '{other}'"),
        };

        let (token_secret, ephemeral_secret) = match get("AUTH_TOKEN_SECRET") {
            Some(encoded) => {
                let secret =
                    from_base64(&encoded).context("AUTH_TOKEN_SECRET is not valid base64")?;
                if secret.len() < MIN_SECRET_BYTES {
                    bail!(
                        "AUTH_TOKEN_SECRET must decode to at least {MIN_SECRET_BYTES} bytes, got {}",
                        secret.len()
                    );
                }
                (secret, false)
            }
            None if environment.is_production() => {
                bail!("AUTH_TOKEN_SECRET must be set in production")
            }
            None => (random_bytes(MIN_SECRET_BYTES), true),
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() && environment.is_production() {
            bail!("DATABASE_URL must be set in production");
        }

        let defaults = AuthConfig::default();
        let limits = RoleRateLimits::default();

        let token_ttl = match parse::<u64>(&get, "AUTH_TOKEN_TTL_SECS")? {
            Some(secs) if secs == 0 || secs > MAX_TOKEN_TTL.as_secs() => bail!(
                "AUTH_TOKEN_TTL_SECS must be between 1 and {}, got {secs}",
                MAX_TOKEN_TTL.as_secs()
            ),
            Some(secs) => Duration::from_secs(secs),
            None => defaults.token_ttl,
        };

        let rate_limits = RoleRateLimits {
            guest: parse(&get, "RATE_LIMIT_GUEST")?.unwrap_or(limits.guest),
            user: parse(&get, "RATE_LIMIT_USER")?.unwrap_or(limits.user),
            admin: parse(&get, "RATE_LIMIT_ADMIN")?.unwrap_or(limits.admin),
            window: match parse::<u64>(&get, "RATE_LIMIT_WINDOW_SECS")? {
                Some(0) => bail!("RATE_LIMIT_WINDOW_SECS must be positive"),
                Some(secs) => Duration::from_secs(secs),
                None => limits.window,
            },
        };

        let fail_mode = match get("ADMISSION_FAIL_MODE").as_deref() {
            None | Some("closed") => FailMode::Closed,
            Some("open") => FailMode::Open,
            Some(other) => bail!("ADMISSION_FAIL_MODE must be 'open' or 'closed', got '{other}'"),
        };

        let trusted_proxies = get("TRUSTED_PROXIES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(|entry| {
                        entry.parse::<IpAddr>().with_context(|| {
                            format!("TRUSTED_PROXIES has an invalid address '{entry}'")
                        })
                    })
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let port = parse(&get, "PORT")?.unwrap_or(DEFAULT_PORT);

        let frontend_origins = get("FRONTEND_ORIGINS")
            .unwrap_or_else(|| DEFAULT_FRONTEND_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            auth: AuthConfig {
                environment,
                token_secret,
                token_ttl,
                password_pepper: get("AUTH_PASSWORD_PEPPER").map(String::into_bytes),
                rate_limits,
                fail_mode,
                trusted_proxies,
                ..defaults
            },
            database_url,
            port,
            frontend_origins,
            ephemeral_secret,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use platform::crypto::to_base64;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_development_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.auth.environment, Environment::Development);
        assert!(config.ephemeral_secret);
        assert_eq!(config.auth.token_secret.len(), MIN_SECRET_BYTES);
        assert_eq!(config.auth.token_ttl, Duration::from_secs(86_400));
        assert_eq!(config.auth.rate_limits, RoleRateLimits::default());
        assert_eq!(config.auth.fail_mode, FailMode::Closed);
        assert!(config.database_url.is_none());
        assert!(config.auth.trusted_proxies.is_empty());
        assert_eq!(config.port, 31113);
        assert_eq!(config.frontend_origins.len(), 2);
    }

    #[test]
    fn test_production_requires_secret_and_database() {
        let err = load(&[("APP_ENV", "production")]).unwrap_err();
        assert!(err.to_string().contains("AUTH_TOKEN_SECRET"));

        let secret = to_base64(&[7u8; 32]);
        let err = load(&[("APP_ENV", "production"), ("AUTH_TOKEN_SECRET", &secret)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let config = load(&[
            ("APP_ENV", "production"),
            ("AUTH_TOKEN_SECRET", &secret),
            ("DATABASE_URL", "postgres://localhost/app"),
        ])
        .unwrap();
        assert!(!config.ephemeral_secret);
        assert_eq!(config.auth.token_secret, vec![7u8; 32]);
        assert!(config.auth.cookie_secure());
    }

    #[test]
    fn test_short_secret_rejected() {
        let short = to_base64(&[1u8; 16]);
        let err = load(&[("AUTH_TOKEN_SECRET", &short)]).unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));

        assert!(load(&[("AUTH_TOKEN_SECRET", "not base64!!")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("AUTH_TOKEN_TTL_SECS", "3600"),
            ("AUTH_PASSWORD_PEPPER", "pepper"),
            ("RATE_LIMIT_GUEST", "2"),
            ("RATE_LIMIT_WINDOW_SECS", "10"),
            ("ADMISSION_FAIL_MODE", "open"),
            ("PORT", "8080"),
            ("FRONTEND_ORIGINS", "https://app.example.com, ,https://admin.example.com"),
        ])
        .unwrap();

        assert_eq!(config.auth.token_ttl_secs(), 3600);
        assert_eq!(config.auth.pepper(), Some(b"pepper".as_slice()));
        assert_eq!(config.auth.rate_limits.guest, 2);
        assert_eq!(config.auth.rate_limits.user, 10);
        assert_eq!(config.auth.rate_limits.window, Duration::from_secs(10));
        assert_eq!(config.auth.fail_mode, FailMode::Open);
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.frontend_origins,
            vec!["https://app.example.com", "https://admin.example.com"]
        );
    }

    #[test]
    fn test_token_ttl_bounds() {
        let year = MAX_TOKEN_TTL.as_secs().to_string();
        assert_eq!(
            load(&[("AUTH_TOKEN_TTL_SECS", &year)]).unwrap().auth.token_ttl,
            MAX_TOKEN_TTL
        );

        let over = (MAX_TOKEN_TTL.as_secs() + 1).to_string();
        let err = load(&[("AUTH_TOKEN_TTL_SECS", &over)]).unwrap_err();
        assert!(err.to_string().contains("AUTH_TOKEN_TTL_SECS"));

        // Values that wrap when treated as signed seconds
        assert!(load(&[("AUTH_TOKEN_TTL_SECS", "18446744073709551615")]).is_err());
        assert!(load(&[("AUTH_TOKEN_TTL_SECS", "9223372036854775807")]).is_err());
        assert!(load(&[("AUTH_TOKEN_TTL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_trusted_proxies() {
        let config = load(&[("TRUSTED_PROXIES", "127.0.0.1, ::1,")]).unwrap();
        assert_eq!(
            config.auth.trusted_proxies,
            vec!["127.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );

        assert!(load(&[("TRUSTED_PROXIES", "10.0.0.0/8")]).is_err());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(load(&[("APP_ENV", "staging")]).is_err());
        assert!(load(&[("PORT", "eighty")]).is_err());
        assert!(load(&[("RATE_LIMIT_USER", "-1")]).is_err());
        assert!(load(&[("RATE_LIMIT_WINDOW_SECS", "0")]).is_err());
        assert!(load(&[("ADMISSION_FAIL_MODE", "maybe")]).is_err());
    }
}

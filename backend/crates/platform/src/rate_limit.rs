//! Rate Limiting Infrastructure
//!
//! Common rate limiting abstractions and implementations.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    /// When the oldest counted request leaves the window
    pub reset_at_ms: i64,
}

impl RateLimitResult {
    /// Whole seconds until a retry can succeed (at least 1)
    pub fn retry_after_secs(&self, now_ms: i64) -> u64 {
        let wait_ms = (self.reset_at_ms - now_ms).max(0) as u64;
        wait_ms.div_ceil(1000).max(1)
    }
}

pub type RateLimitStoreError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Check the window for `key` and record the request if it is allowed.
    ///
    /// Check and record happen atomically per key. A rejected request is
    /// not recorded.
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitStoreError>;
}

/// In-process sliding-log rate limiter
///
/// Each key holds the timestamps of its accepted requests inside the
/// current window. `DashMap::entry` keeps the shard locked for the whole
/// check-and-record, so concurrent callers on one key cannot overshoot.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    entries: DashMap<String, VecDeque<i64>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_sync(&self, key: &str, config: &RateLimitConfig, now_ms: i64) -> RateLimitResult {
        let window_start = now_ms - config.window_ms();
        let mut log = self.entries.entry(key.to_string()).or_default();

        while log.front().is_some_and(|&ts| ts <= window_start) {
            log.pop_front();
        }

        let used = log.len() as u32;
        if used >= config.max_requests {
            let reset_at_ms = log
                .front()
                .map_or(now_ms, |&oldest| oldest + config.window_ms());
            return RateLimitResult {
                allowed: false,
                remaining: 0,
                reset_at_ms,
            };
        }

        log.push_back(now_ms);
        let reset_at_ms = log
            .front()
            .map_or(now_ms, |&oldest| oldest + config.window_ms());

        RateLimitResult {
            allowed: true,
            remaining: config.max_requests - used - 1,
            reset_at_ms,
        }
    }

    /// Drop keys whose newest request is older than `max_window`.
    ///
    /// Returns the number of keys removed.
    pub fn cleanup_expired(&self, now_ms: i64, max_window: Duration) -> usize {
        let cutoff = now_ms - max_window.as_millis() as i64;
        let before = self.entries.len();
        self.entries
            .retain(|_, log| log.back().is_some_and(|&newest| newest > cutoff));
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, RateLimitStoreError> {
        Ok(self.check_sync(key, config, now_ms))
    }
}

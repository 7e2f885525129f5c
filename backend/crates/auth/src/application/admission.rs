//! Admission Gate
//!
//! Decides whether a request may reach a handler at all:
//! 1. bot detectors
//! 2. shield rules
//! 3. per-role sliding-window rate limit
//!
//! The first rejecting stage wins. A stage that errors is handled per
//! [`FailMode`].

use std::fmt;
use std::sync::Arc;

use platform::rate_limit::{RateLimitConfig, RateLimitStore, now_ms};
use platform::shield::{
    BotDetector, PatternShield, RequestSignals, ShieldError, ShieldRule, UserAgentBotDetector,
    Verdict,
};

use crate::application::config::{FailMode, RoleRateLimits};
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};
use crate::error::AuthError;

/// Who is asking, as far as admission is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No valid token. Keyed by client fingerprint.
    Guest { fingerprint: String },
    /// Valid token. Keyed by user id.
    Member { user_id: UserId, role: UserRole },
}

impl Caller {
    /// Rate limit bucket key
    pub fn key(&self) -> String {
        match self {
            Caller::Guest { fingerprint } => format!("guest:{fingerprint}"),
            Caller::Member { user_id, .. } => format!("user:{user_id}"),
        }
    }

    pub fn role_label(&self) -> &'static str {
        match self {
            Caller::Guest { .. } => "guest",
            Caller::Member { role, .. } => role.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Bot,
    Shield,
    RateLimited { retry_after_secs: u64 },
    Unavailable,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Bot => "bot",
            RejectReason::Shield => "shield",
            RejectReason::RateLimited { .. } => "rate-limit",
            RejectReason::Unavailable => "unavailable",
        }
    }
}

impl From<RejectReason> for AuthError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::Bot => AuthError::BotDetected,
            RejectReason::Shield => AuthError::ShieldBlocked,
            RejectReason::RateLimited { retry_after_secs } => {
                AuthError::RateLimitExceeded { retry_after_secs }
            }
            RejectReason::Unavailable => AuthError::AdmissionUnavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allow { remaining: u32 },
    Reject(RejectReason),
}

impl AdmissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allow { .. })
    }
}

pub struct AdmissionGate<L>
where
    L: RateLimitStore,
{
    limiter: Arc<L>,
    limits: RoleRateLimits,
    fail_mode: FailMode,
    bot_detectors: Vec<Arc<dyn BotDetector>>,
    shield_rules: Vec<Arc<dyn ShieldRule>>,
}

impl<L> AdmissionGate<L>
where
    L: RateLimitStore,
{
    /// Gate with the stock heuristics ([`UserAgentBotDetector`], [`PatternShield`])
    pub fn new(limiter: Arc<L>, limits: RoleRateLimits, fail_mode: FailMode) -> Self {
        Self::without_screening(limiter, limits, fail_mode)
            .with_bot_detector(Arc::new(UserAgentBotDetector::default()))
            .with_shield_rule(Arc::new(PatternShield::new()))
    }

    /// Gate that only rate limits
    pub fn without_screening(limiter: Arc<L>, limits: RoleRateLimits, fail_mode: FailMode) -> Self {
        Self {
            limiter,
            limits,
            fail_mode,
            bot_detectors: Vec::new(),
            shield_rules: Vec::new(),
        }
    }

    pub fn with_bot_detector(mut self, detector: Arc<dyn BotDetector>) -> Self {
        self.bot_detectors.push(detector);
        self
    }

    pub fn with_shield_rule(mut self, rule: Arc<dyn ShieldRule>) -> Self {
        self.shield_rules.push(rule);
        self
    }

    pub fn fail_mode(&self) -> FailMode {
        self.fail_mode
    }

    pub fn rate_limit_for(&self, caller: &Caller) -> RateLimitConfig {
        let max_requests = match caller {
            Caller::Guest { .. } => self.limits.guest,
            Caller::Member {
                role: UserRole::User,
                ..
            } => self.limits.user,
            Caller::Member {
                role: UserRole::Admin,
                ..
            } => self.limits.admin,
        };
        self.limits.config(max_requests)
    }

    pub async fn admit(&self, caller: &Caller, request: &RequestSignals<'_>) -> AdmissionDecision {
        self.admit_at(caller, request, now_ms()).await
    }

    /// Same as [`admit`](Self::admit) with an explicit clock (Unix ms)
    pub async fn admit_at(
        &self,
        caller: &Caller,
        request: &RequestSignals<'_>,
        now_ms: i64,
    ) -> AdmissionDecision {
        for detector in &self.bot_detectors {
            if let Some(reject) = self.screen(detector.inspect(request), RejectReason::Bot, caller) {
                return AdmissionDecision::Reject(reject);
            }
        }

        for rule in &self.shield_rules {
            if let Some(reject) = self.screen(rule.inspect(request), RejectReason::Shield, caller) {
                return AdmissionDecision::Reject(reject);
            }
        }

        let config = self.rate_limit_for(caller);
        match self
            .limiter
            .check_and_increment(&caller.key(), &config, now_ms)
            .await
        {
            Ok(result) if result.allowed => AdmissionDecision::Allow {
                remaining: result.remaining,
            },
            Ok(result) => {
                let retry_after_secs = result.retry_after_secs(now_ms);
                tracing::info!(
                    caller = caller.role_label(),
                    limit = config.max_requests,
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                AdmissionDecision::Reject(RejectReason::RateLimited { retry_after_secs })
            }
            Err(e) => match self.fail_mode {
                FailMode::Open => {
                    tracing::warn!(error = %e, "Rate limiter unavailable, failing open");
                    AdmissionDecision::Allow {
                        remaining: config.max_requests,
                    }
                }
                FailMode::Closed => {
                    tracing::error!(error = %e, "Rate limiter unavailable, failing closed");
                    AdmissionDecision::Reject(RejectReason::Unavailable)
                }
            },
        }
    }

    fn screen(
        &self,
        outcome: Result<Verdict, ShieldError>,
        reason: RejectReason,
        caller: &Caller,
    ) -> Option<RejectReason> {
        match outcome {
            Ok(Verdict::Pass) => None,
            Ok(Verdict::Flag(label)) => {
                tracing::warn!(
                    reason = reason.as_str(),
                    label,
                    caller = caller.role_label(),
                    "Request rejected by screening"
                );
                Some(reason)
            }
            Err(e) => match self.fail_mode {
                FailMode::Open => {
                    tracing::warn!(error = %e, stage = reason.as_str(), "Screening unavailable, failing open");
                    None
                }
                FailMode::Closed => {
                    tracing::error!(error = %e, stage = reason.as_str(), "Screening unavailable, failing closed");
                    Some(RejectReason::Unavailable)
                }
            },
        }
    }
}

impl<L> fmt::Debug for AdmissionGate<L>
where
    L: RateLimitStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("limits", &self.limits)
            .field("fail_mode", &self.fail_mode)
            .field("bot_detectors", &self.bot_detectors.len())
            .field("shield_rules", &self.shield_rules.len())
            .finish()
    }
}

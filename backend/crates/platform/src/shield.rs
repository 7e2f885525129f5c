//! Request Screening
//!
//! Cheap, synchronous heuristics run before any business logic:
//! - [`BotDetector`]: is this an automated client?
//! - [`ShieldRule`]: does the request carry an attack payload?
//!
//! Both are object-safe so the admission layer can hold a list of them.
//! A stage that cannot reach a decision returns [`ShieldError`] and the
//! caller applies its fail mode.

use std::net::IpAddr;

use thiserror::Error;

/// What the screening stages get to see of a request
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSignals<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub ip: Option<IpAddr>,
}

/// Outcome of a single screening stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Flagged, with a short label for logs
    Flag(&'static str),
}

impl Verdict {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Verdict::Flag(_))
    }
}

#[derive(Debug, Error)]
pub enum ShieldError {
    #[error("Screening backend unavailable: {0}")]
    Unavailable(String),
}

pub trait BotDetector: Send + Sync {
    fn inspect(&self, request: &RequestSignals<'_>) -> Result<Verdict, ShieldError>;
}

pub trait ShieldRule: Send + Sync {
    fn inspect(&self, request: &RequestSignals<'_>) -> Result<Verdict, ShieldError>;
}

// ============================================================================
// User-Agent bot detection
// ============================================================================

/// Crawlers that are allowed through even though they identify as bots
const SEARCH_ENGINE_CRAWLERS: &[&str] = &[
    "googlebot",
    "bingbot",
    "duckduckbot",
    "applebot",
    "yandexbot",
    "baiduspider",
];

/// Substrings of User-Agent values sent by automation tooling
const AUTOMATION_MARKERS: &[&str] = &[
    // HTTP libraries / CLIs
    "curl/",
    "wget/",
    "python-requests",
    "python-urllib",
    "aiohttp",
    "httpx",
    "go-http-client",
    "okhttp",
    "libwww-perl",
    "java/",
    "scrapy",
    // Headless / driven browsers
    "headlesschrome",
    "phantomjs",
    "selenium",
    "puppeteer",
    "playwright",
    // Self-identified
    "bot",
    "crawler",
    "spider",
];

/// Flags requests by their User-Agent header
///
/// Missing or blank User-Agent is flagged: every mainstream browser sends one.
#[derive(Debug, Clone)]
pub struct UserAgentBotDetector {
    allow_search_engines: bool,
}

impl Default for UserAgentBotDetector {
    fn default() -> Self {
        Self {
            allow_search_engines: true,
        }
    }
}

impl UserAgentBotDetector {
    pub fn new(allow_search_engines: bool) -> Self {
        Self {
            allow_search_engines,
        }
    }

    pub fn classify(&self, user_agent: Option<&str>) -> Verdict {
        let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
            return Verdict::Flag("missing-user-agent");
        };
        let ua = ua.to_ascii_lowercase();

        if self.allow_search_engines && SEARCH_ENGINE_CRAWLERS.iter().any(|c| ua.contains(c)) {
            return Verdict::Pass;
        }

        if AUTOMATION_MARKERS.iter().any(|m| ua.contains(m)) {
            return Verdict::Flag("automation-user-agent");
        }

        Verdict::Pass
    }
}

impl BotDetector for UserAgentBotDetector {
    fn inspect(&self, request: &RequestSignals<'_>) -> Result<Verdict, ShieldError> {
        Ok(self.classify(request.user_agent))
    }
}

// ============================================================================
// Attack pattern shield
// ============================================================================

const TRAVERSAL_MARKERS: &[&str] = &["../", "..\\", "/..", "\\.."];

const SQL_INJECTION_MARKERS: &[&str] = &[
    "' or '",
    "' or 1=1",
    "\" or \"",
    " or 1=1",
    "'--",
    "';",
    "union select",
    "union all select",
    "; drop table",
    "information_schema",
    "xp_cmdshell",
    "sleep(",
    "benchmark(",
];

const SCRIPT_INJECTION_MARKERS: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "onerror=",
    "onload=",
    "<iframe",
    "<svg",
    "document.cookie",
];

/// Rejects requests whose path or query carries common attack payloads
///
/// Inputs are percent-decoded (twice, to catch double encoding) and
/// lowercased before matching.
#[derive(Debug, Clone, Default)]
pub struct PatternShield;

impl PatternShield {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, raw: &str) -> Verdict {
        let once = percent_decode(&raw.replace('+', " "));
        let twice = percent_decode(&once);

        for candidate in [raw.to_ascii_lowercase(), once.to_lowercase(), twice.to_lowercase()] {
            if candidate.contains('\0') {
                return Verdict::Flag("null-byte");
            }
            if TRAVERSAL_MARKERS.iter().any(|m| candidate.contains(m)) {
                return Verdict::Flag("path-traversal");
            }
            if SQL_INJECTION_MARKERS.iter().any(|m| candidate.contains(m)) {
                return Verdict::Flag("sql-injection");
            }
            if SCRIPT_INJECTION_MARKERS.iter().any(|m| candidate.contains(m)) {
                return Verdict::Flag("script-injection");
            }
        }

        Verdict::Pass
    }
}

impl ShieldRule for PatternShield {
    fn inspect(&self, request: &RequestSignals<'_>) -> Result<Verdict, ShieldError> {
        let path = self.classify(request.path);
        if path.is_flagged() {
            return Ok(path);
        }
        Ok(request.query.map_or(Verdict::Pass, |q| self.classify(q)))
    }
}

/// Lenient percent-decoding: malformed escapes are kept literally
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hi = (bytes[i + 1] as char).to_digit(16);
            let lo = (bytes[i + 2] as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hi, lo) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals<'a>(path: &'a str, query: Option<&'a str>, ua: Option<&'a str>) -> RequestSignals<'a> {
        RequestSignals {
            method: "GET",
            path,
            query,
            user_agent: ua,
            ip: None,
        }
    }

    #[test]
    fn test_browser_passes() {
        let detector = UserAgentBotDetector::default();
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";
        assert_eq!(detector.classify(Some(ua)), Verdict::Pass);
    }

    #[test]
    fn test_missing_user_agent_flagged() {
        let detector = UserAgentBotDetector::default();
        assert!(detector.classify(None).is_flagged());
        assert!(detector.classify(Some("   ")).is_flagged());
    }

    #[test]
    fn test_automation_clients_flagged() {
        let detector = UserAgentBotDetector::default();
        for ua in [
            "curl/8.4.0",
            "python-requests/2.31",
            "Mozilla/5.0 HeadlessChrome/120.0",
            "SomeRandomBot/1.0",
        ] {
            assert_eq!(
                detector.classify(Some(ua)),
                Verdict::Flag("automation-user-agent"),
                "{ua}"
            );
        }
    }

    #[test]
    fn test_search_engines_allowed_unless_disabled() {
        let ua = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
        assert_eq!(UserAgentBotDetector::default().classify(Some(ua)), Verdict::Pass);
        assert!(UserAgentBotDetector::new(false).classify(Some(ua)).is_flagged());
    }

    #[test]
    fn test_clean_requests_pass_shield() {
        let shield = PatternShield::new();
        let req = signals("/api/auth/signin", Some("next=%2Fhome&lang=en"), None);
        assert_eq!(shield.inspect(&req).unwrap(), Verdict::Pass);
    }

    #[test]
    fn test_path_traversal_flagged() {
        let shield = PatternShield::new();
        for path in ["/static/../../etc/passwd", "/static/%2e%2e%2fetc", "/a/%252e%252e%252f"] {
            assert_eq!(shield.classify(path), Verdict::Flag("path-traversal"), "{path}");
        }
    }

    #[test]
    fn test_sql_injection_flagged() {
        let shield = PatternShield::new();
        let req = signals("/api/users", Some("id=1%27%20OR%20%271%27%3D%271"), None);
        assert_eq!(shield.inspect(&req).unwrap(), Verdict::Flag("sql-injection"));
        assert!(shield.classify("q=1+UNION+SELECT+password").is_flagged());
    }

    #[test]
    fn test_script_injection_flagged() {
        let shield = PatternShield::new();
        assert_eq!(
            shield.classify("q=%3Cscript%3Ealert(1)%3C/script%3E"),
            Verdict::Flag("script-injection")
        );
    }

    #[test]
    fn test_percent_decode_is_lenient() {
        assert_eq!(percent_decode("a%20b"), "a b");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}

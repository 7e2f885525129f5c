//! Client identification utilities
//!
//! Resolves who is on the other end of a connection, for rate limiting
//! anonymous callers.

use axum::http::HeaderMap;
use std::net::IpAddr;

use crate::crypto::sha256;

/// Anonymous caller identity, derived from the resolved client IP only
///
/// Headers such as User-Agent are left out: a client can change them on
/// every request.
#[derive(Debug, Clone)]
pub struct ClientFingerprint {
    /// SHA-256 of the client IP (or of the empty string when unknown)
    pub hash: [u8; 32],
    pub ip: Option<IpAddr>,
}

impl ClientFingerprint {
    pub fn new(ip: Option<IpAddr>) -> Self {
        let material = ip.map(|ip| ip.to_string()).unwrap_or_default();

        Self {
            hash: sha256(material.as_bytes()),
            ip,
        }
    }

    /// Hex-encoded hash, usable as a map key
    pub fn key(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Resolve the client IP of a request
///
/// `X-Forwarded-For` is only read when the socket peer is one of
/// `trusted_proxies`. The header is then walked right to left, skipping
/// trusted hops; the first untrusted address is the client. Anything left
/// of it was written by the client and is ignored.
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer_ip: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer_ip?;
    if !trusted_proxies.contains(&peer) {
        return Some(peer);
    }

    let hops = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .collect::<Vec<_>>();

    for hop in hops.iter().rev() {
        match hop.parse::<IpAddr>() {
            Ok(ip) if trusted_proxies.contains(&ip) => continue,
            Ok(ip) => return Some(ip),
            // Garbage at a hop we cannot vouch for: stop at the last trusted peer
            Err(_) => break,
        }
    }

    Some(peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn xff(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_fingerprint_is_stable_and_ip_sensitive() {
        let a = ip("10.0.0.1");
        let b = ip("10.0.0.2");

        assert_eq!(ClientFingerprint::new(Some(a)).key(), ClientFingerprint::new(Some(a)).key());
        assert_ne!(ClientFingerprint::new(Some(a)).key(), ClientFingerprint::new(Some(b)).key());
        assert_eq!(ClientFingerprint::new(None).key().len(), 64);
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_for() {
        let peer = ip("203.0.113.9");

        assert_eq!(extract_client_ip(&xff("10.0.0.1"), Some(peer), &[]), Some(peer));
        assert_eq!(
            extract_client_ip(&xff("10.0.0.1"), Some(peer), &[ip("127.0.0.1")]),
            Some(peer)
        );
    }

    #[test]
    fn test_trusted_proxy_uses_rightmost_untrusted_hop() {
        let proxy = ip("127.0.0.1");
        let lb = ip("10.1.0.1");
        let trusted = [proxy, lb];

        // Leftmost entry is client-written and must not win
        let headers = xff("6.6.6.6, 198.51.100.7, 10.1.0.1");
        assert_eq!(
            extract_client_ip(&headers, Some(proxy), &trusted),
            Some(ip("198.51.100.7"))
        );
    }

    #[test]
    fn test_trusted_proxy_without_header_or_with_garbage() {
        let proxy = ip("127.0.0.1");

        assert_eq!(extract_client_ip(&HeaderMap::new(), Some(proxy), &[proxy]), Some(proxy));
        assert_eq!(extract_client_ip(&xff("not-an-ip"), Some(proxy), &[proxy]), Some(proxy));
    }

    #[test]
    fn test_no_peer_means_unknown() {
        assert_eq!(extract_client_ip(&xff("10.0.0.1"), None, &[]), None);
    }
}

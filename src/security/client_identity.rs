//! Client identity resolution.
//!
//! The identifier keys all rate-limit state. It is taken from the first
//! `X-Forwarded-For` entry when that header is trusted, otherwise from the
//! connection's peer IP. No IP syntax validation is done: the header value
//! is an opaque, client-controlled string and must be treated as advisory.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

use crate::config::IdentityConfig;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier used when neither the header nor the peer address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derives a stable, non-empty identifier for the calling client.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    trust_forwarded_header: bool,
    trusted_proxies: Vec<IpAddr>,
}

impl ClientIdentity {
    pub fn new(trust_forwarded_header: bool, trusted_proxies: Vec<IpAddr>) -> Self {
        Self {
            trust_forwarded_header,
            trusted_proxies,
        }
    }

    /// Build from configuration. Entries that do not parse are skipped; the
    /// validator rejects them before this point.
    pub fn from_config(config: &IdentityConfig) -> Self {
        let trusted_proxies = config
            .trusted_proxies
            .iter()
            .filter_map(|p| p.parse().ok())
            .collect();
        Self::new(config.trust_forwarded_header, trusted_proxies)
    }

    /// Resolve the identifier for a request. Never fails.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.honours_forwarded_from(peer) {
            if let Some(client) = first_forwarded(headers) {
                return client.to_string();
            }
        }

        match peer {
            Some(addr) => addr.ip().to_string(),
            None => UNKNOWN_CLIENT.to_string(),
        }
    }

    fn honours_forwarded_from(&self, peer: Option<SocketAddr>) -> bool {
        if !self.trust_forwarded_header {
            return false;
        }
        if self.trusted_proxies.is_empty() {
            return true;
        }
        peer.is_some_and(|addr| self.trusted_proxies.contains(&addr.ip()))
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::from_config(&IdentityConfig::default())
    }
}

/// First comma-separated entry of the first `X-Forwarded-For` value, trimmed.
fn first_forwarded(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("10.1.1.1:54321".parse().unwrap())
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn uses_first_forwarded_entry() {
        let identity = ClientIdentity::default();
        let headers = forwarded(" 192.168.1.1 , 10.0.0.1");
        assert_eq!(identity.resolve(&headers, peer()), "192.168.1.1");
        // Deterministic for the same header value.
        assert_eq!(identity.resolve(&headers, None), "192.168.1.1");
    }

    #[test]
    fn header_value_is_opaque() {
        let identity = ClientIdentity::default();
        let headers = forwarded("not-an-ip, 1.2.3.4");
        assert_eq!(identity.resolve(&headers, peer()), "not-an-ip");
    }

    #[test]
    fn falls_back_to_peer_ip() {
        let identity = ClientIdentity::default();
        assert_eq!(identity.resolve(&HeaderMap::new(), peer()), "10.1.1.1");
    }

    #[test]
    fn empty_first_entry_falls_back() {
        let identity = ClientIdentity::default();
        assert_eq!(identity.resolve(&forwarded(" , 1.2.3.4"), peer()), "10.1.1.1");
        assert_eq!(identity.resolve(&forwarded(""), peer()), "10.1.1.1");
    }

    #[test]
    fn non_ascii_header_falls_back() {
        let identity = ClientIdentity::default();
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_bytes(b"\xfa\xfb").unwrap());
        assert_eq!(identity.resolve(&headers, peer()), "10.1.1.1");
    }

    #[test]
    fn no_peer_and_no_header_is_unknown() {
        let identity = ClientIdentity::default();
        assert_eq!(identity.resolve(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }

    #[test]
    fn untrusted_header_is_ignored() {
        let identity = ClientIdentity::new(false, Vec::new());
        assert_eq!(identity.resolve(&forwarded("1.2.3.4"), peer()), "10.1.1.1");
    }

    #[test]
    fn header_only_honoured_from_trusted_proxies() {
        let identity = ClientIdentity::new(true, vec!["10.1.1.1".parse().unwrap()]);
        let headers = forwarded("1.2.3.4");
        assert_eq!(identity.resolve(&headers, peer()), "1.2.3.4");

        let other: Option<SocketAddr> = Some("10.9.9.9:80".parse().unwrap());
        assert_eq!(identity.resolve(&headers, other), "10.9.9.9");
        assert_eq!(identity.resolve(&headers, None), UNKNOWN_CLIENT);
    }
}

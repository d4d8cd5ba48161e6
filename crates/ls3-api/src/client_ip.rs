// Copyright 2025 The LS3 Authors
// SPDX-License-Identifier: Apache-2.0

//! Remote address and transport-security resolution.
//!
//! Behind a reverse proxy the connection peer is the proxy, so both
//! the client IP and the TLS flag become pluggable strategies.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use http::HeaderMap;

/// How the client address and transport security are determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAddrStrategy {
    /// Use the connection peer directly; the transport is plain HTTP.
    #[default]
    Direct,
    /// Trust `X-Real-Ip` and `X-Forwarded-Proto` from a fronting
    /// proxy, falling back to the connection peer.
    Forwarded,
}

impl ClientAddrStrategy {
    /// Resolves the client IP for a request.
    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
        let direct =
            peer.map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |addr| addr.ip());

        match self {
            ClientAddrStrategy::Direct => direct,
            ClientAddrStrategy::Forwarded => headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(direct),
        }
    }

    /// Resolves whether the client connection is secure.
    #[must_use]
    pub fn secure_transport(&self, headers: &HeaderMap) -> bool {
        match self {
            // The server itself only terminates plain HTTP
            ClientAddrStrategy::Direct => false,
            ClientAddrStrategy::Forwarded => headers
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .map(|v| v == "https")
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.7:4412".parse().unwrap())
    }

    #[test]
    fn direct_uses_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "10.0.0.9".parse().unwrap());

        let ip = ClientAddrStrategy::Direct.client_ip(&headers, peer());
        assert_eq!(ip, "192.0.2.7".parse::<IpAddr>().unwrap());
        assert!(!ClientAddrStrategy::Direct.secure_transport(&headers));
    }

    #[test]
    fn forwarded_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "10.0.0.9".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());

        let strategy = ClientAddrStrategy::Forwarded;
        assert_eq!(strategy.client_ip(&headers, peer()), "10.0.0.9".parse::<IpAddr>().unwrap());
        assert!(strategy.secure_transport(&headers));
    }

    #[test]
    fn forwarded_falls_back_on_invalid_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "not-an-ip".parse().unwrap());
        headers.insert("x-forwarded-proto", "http".parse().unwrap());

        let strategy = ClientAddrStrategy::Forwarded;
        assert_eq!(strategy.client_ip(&headers, peer()), "192.0.2.7".parse::<IpAddr>().unwrap());
        assert!(!strategy.secure_transport(&headers));
    }

    #[test]
    fn missing_peer_is_unspecified() {
        let headers = HeaderMap::new();
        let ip = ClientAddrStrategy::Direct.client_ip(&headers, None);
        assert!(ip.is_unspecified());
    }
}

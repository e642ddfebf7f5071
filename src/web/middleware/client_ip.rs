//! Client IP extraction from trusted proxy headers.
//!
//! Priority: `CF-Connecting-IP` (Cloudflare) -> rightmost `X-Forwarded-For`
//! (appended by our edge proxy) -> socket peer address. Resolution never
//! rejects a request: an unknown address is `None`.

use axum::extract::{ConnectInfo, FromRequestParts};
use http::HeaderMap;
use http::request::Parts;
use std::convert::Infallible;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// The resolved client IP address, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ip) => write!(f, "{ip}"),
            None => f.write_str("unknown"),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(resolve(&parts.headers, peer)))
    }
}

fn resolve(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    if let Some(ip) = header_str(headers, "cf-connecting-ip").and_then(|s| s.trim().parse().ok()) {
        return Some(ip);
    }

    if let Some(ip) = header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.rsplit(',').next())
        .and_then(|s| s.trim().parse().ok())
    {
        return Some(ip);
    }

    peer
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn cloudflare_header_wins() {
        let map = headers(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "10.0.0.1, 198.51.100.2"),
        ]);
        assert_eq!(resolve(&map, None), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn rightmost_forwarded_for_is_used() {
        let map = headers(&[("x-forwarded-for", "10.0.0.1, 198.51.100.2")]);
        assert_eq!(resolve(&map, None), Some("198.51.100.2".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_peer() {
        let peer: IpAddr = "127.0.0.1".parse().unwrap();
        assert_eq!(resolve(&headers(&[("x-forwarded-for", "garbage")]), Some(peer)), Some(peer));
        assert_eq!(resolve(&HeaderMap::new(), None), None);
        assert_eq!(ClientIp(None).to_string(), "unknown");
    }
}

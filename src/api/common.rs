//! Common API utilities and shared types

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use serde::Deserialize;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::effects::{Capabilities, EffectsMode};
use crate::models::ListParams;
use crate::services::fingerprint::client_fingerprint;

// ============================================================================
// Pagination
// ============================================================================

pub fn default_page() -> u32 {
    1
}

pub fn default_page_size() -> u32 {
    10
}

pub fn default_per_page() -> u32 {
    20
}

/// Public pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.page_size)
    }
}

/// Admin pagination query parameters
#[derive(Debug, Deserialize)]
pub struct AdminPaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl AdminPaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

// ============================================================================
// Client identity
// ============================================================================

/// Who is asking: best-effort IP, user agent and the derived fingerprint
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: String,
    pub fingerprint: String,
    pub effects_mode: EffectsMode,
}

impl ClientInfo {
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let ip = forwarded_ip(headers).or_else(|| peer.map(|addr| addr.ip()));
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let ip_str = ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".to_string());
        Self {
            fingerprint: client_fingerprint(&ip_str, &user_agent),
            ip,
            user_agent,
            effects_mode: Capabilities::from_client_hints(headers).effects_mode(),
        }
    }
}

/// First address in `X-Forwarded-For`, else `X-Real-IP`
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());
    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::from_parts(&parts.headers, peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8"));
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();

        let info = ClientInfo::from_parts(&headers, Some(peer));
        assert_eq!(info.ip, Some("203.0.113.7".parse().unwrap()));
        assert_eq!(info.fingerprint, client_fingerprint("203.0.113.7", "curl/8"));
    }

    #[test]
    fn test_falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.1:1234".parse().unwrap();
        assert_eq!(ClientInfo::from_parts(&headers, Some(peer)).ip, Some(peer.ip()));

        let anonymous = ClientInfo::from_parts(&headers, None);
        assert_eq!(anonymous.ip, None);
        assert_eq!(anonymous.fingerprint, client_fingerprint("unknown", ""));
    }

    #[test]
    fn test_pagination_defaults() {
        let q: PaginationQuery = serde_json::from_str("{}").unwrap();
        assert_eq!((q.page, q.page_size), (1, 10));
        let q: AdminPaginationQuery = serde_json::from_str(r#"{"page": 3}"#).unwrap();
        assert_eq!((q.page, q.per_page), (3, 20));
    }
}

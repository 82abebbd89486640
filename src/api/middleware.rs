/// Request header helpers shared by the extractors and handlers
use axum::{
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap},
};
use std::net::SocketAddr;

/// State of the `Authorization` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerToken {
    Missing,
    Malformed,
    Present(String),
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> BearerToken {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return BearerToken::Missing;
    };

    match value.to_str().ok().and_then(|s| s.strip_prefix("Bearer ")) {
        Some(token) if !token.trim().is_empty() => BearerToken::Present(token.trim().to_string()),
        _ => BearerToken::Malformed,
    }
}

/// Best-effort client address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer when the server exposes it.
pub fn client_ip(parts: &Parts) -> Option<String> {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let real_ip = || {
        parts
            .headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .map(str::to_string)
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

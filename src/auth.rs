/// Authentication extractors
///
/// [`AuthUser`] guards ordinary authenticated routes. [`RefreshAuth`] guards
/// only the reissue route and accepts nothing but an expired access token
/// paired with a valid refresh token.
use crate::{
    api::middleware::{client_ip, extract_bearer_token, BearerToken},
    context::AppContext,
    error::ServiceError,
    session::{Claims, Principal, TokenFailure, TokenKind},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use std::convert::Infallible;

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Caller authenticated by a live, non-revoked access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub claims: Claims,
    /// The access token itself, needed to blacklist it on logout
    pub token: String,
}

impl AuthUser {
    pub fn principal(&self) -> &Principal {
        &self.claims.principal
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = match extract_bearer_token(&parts.headers) {
            BearerToken::Present(token) => token,
            BearerToken::Missing if parts.uri.path().ends_with("/logout") => {
                return Err(ServiceError::Authentication("Already logged out".to_string()))
            }
            BearerToken::Missing => {
                return Err(ServiceError::Authentication(
                    "Missing authorization header".to_string(),
                ))
            }
            BearerToken::Malformed => {
                return Err(ServiceError::Authentication(
                    "Malformed authorization header".to_string(),
                ))
            }
        };

        if let Some(entry) = state.session_service.blacklist_entry(&token).await? {
            tracing::debug!("Rejected revoked token of {}", entry.principal.user_id);
            return Err(ServiceError::Authorization(entry.reason));
        }

        let claims = state.codec.verify(&token, TokenKind::Access)?;

        Ok(AuthUser { claims, token })
    }
}

/// Caller allowed to exchange a refresh token for a new pair
#[derive(Debug, Clone)]
pub struct RefreshAuth {
    /// Identity carried by the refresh token
    pub principal: Principal,
    pub refresh_token: String,
    pub client_ip: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppContext> for RefreshAuth {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let refresh_token = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
        let access_token = match extract_bearer_token(&parts.headers) {
            BearerToken::Present(token) => Some(token),
            _ => None,
        };

        let (Some(refresh_token), Some(access_token)) = (refresh_token, access_token) else {
            return Err(ServiceError::Authentication(
                "Access or refresh token missing".to_string(),
            ));
        };

        match state.codec.verify(&access_token, TokenKind::Access) {
            Ok(_) => {
                return Err(ServiceError::Authorization(
                    "Access token is still valid and cannot be reissued".to_string(),
                ))
            }
            Err(TokenFailure::Expired) => {}
            Err(_) => {
                return Err(ServiceError::Authorization(
                    "Access token is not eligible for reissue".to_string(),
                ))
            }
        }

        let claims = state.codec.verify(&refresh_token, TokenKind::Refresh)?;

        Ok(RefreshAuth {
            principal: claims.principal,
            refresh_token,
            client_ip: client_ip(parts),
        })
    }
}

/// Best-effort client address of the request
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts)))
    }
}

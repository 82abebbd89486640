/// Access and refresh token signing and verification
///
/// Both token kinds carry the same [`Principal`]; they differ only in the
/// HMAC secret and lifetime. Verification distinguishes an expired token from
/// a malformed or tampered one, which the reissue flow depends on.
use crate::{
    config::AuthConfig,
    error::{ServiceError, ServiceResult},
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

/// Principal id used for system-initiated forced logout
pub const SENTINEL_ID: i64 = -1;

/// Display name carried by forced-logout principals
pub const SENTINEL_NAME: &str = "auto-logout";

/// Authenticated identity embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: i64,
    pub user_id: String,
    pub name: String,
}

impl Principal {
    /// Synthetic principal for the forced logout of `user_id`
    pub fn forced_logout(user_id: &str) -> Self {
        Self {
            id: SENTINEL_ID,
            user_id: user_id.to_string(),
            name: SENTINEL_NAME.to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == SENTINEL_ID
    }
}

/// Signed token payload: `{id, userId, name, iat, exp}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub principal: Principal,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Seconds left until `exp`, never negative
    pub fn remaining_secs(&self) -> u64 {
        (self.exp - Utc::now().timestamp()).max(0) as u64
    }
}

/// Which secret a token is signed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Why a token failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenFailure {
    /// Signature is good but the token is past `exp`
    Expired,
    /// Malformed, tampered with, or signed with another secret
    Invalid,
    /// Anything else (key or crypto backend failures)
    Other(String),
}

impl TokenFailure {
    /// Status code reported for this failure: 401, 402 or 500
    pub fn status_code(&self) -> u16 {
        match self {
            TokenFailure::Expired => 401,
            TokenFailure::Invalid => 402,
            TokenFailure::Other(_) => 500,
        }
    }
}

impl From<TokenFailure> for ServiceError {
    fn from(failure: TokenFailure) -> Self {
        match failure {
            TokenFailure::Expired => ServiceError::Authentication("Token has expired".to_string()),
            TokenFailure::Invalid => ServiceError::InvalidToken("Invalid token".to_string()),
            TokenFailure::Other(e) => {
                ServiceError::Internal(format!("Token verification failed: {}", e))
            }
        }
    }
}

/// Freshly issued access/refresh pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token signer/verifier
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
    ephemeral_ttl: i64,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_ttl as i64,
            refresh_ttl: config.refresh_ttl as i64,
            ephemeral_ttl: config.ephemeral_ttl as i64,
        }
    }

    /// Refresh lifetime in seconds; session records share it
    pub fn refresh_ttl(&self) -> u64 {
        self.refresh_ttl as u64
    }

    pub fn issue_access(&self, principal: &Principal) -> ServiceResult<String> {
        self.issue(TokenKind::Access, principal, self.access_ttl)
    }

    pub fn issue_refresh(&self, principal: &Principal) -> ServiceResult<String> {
        self.issue(TokenKind::Refresh, principal, self.refresh_ttl)
    }

    /// Very short-lived access token for forced logout. Never handed to a client.
    pub fn issue_ephemeral(&self, principal: &Principal) -> ServiceResult<String> {
        self.issue(TokenKind::Access, principal, self.ephemeral_ttl)
    }

    pub fn issue_pair(&self, principal: &Principal) -> ServiceResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue_access(principal)?,
            refresh_token: self.issue_refresh(principal)?,
        })
    }

    fn issue(&self, kind: TokenKind, principal: &Principal, lifetime: i64) -> ServiceResult<String> {
        let now = Utc::now().timestamp();
        self.sign(kind, principal, now, now + lifetime)
    }

    /// Sign explicit `iat`/`exp` values
    pub fn sign(
        &self,
        kind: TokenKind,
        principal: &Principal,
        iat: i64,
        exp: i64,
    ) -> ServiceResult<String> {
        let claims = Claims {
            principal: principal.clone(),
            iat,
            exp,
        };

        let key = match kind {
            TokenKind::Access => &self.access_encoding,
            TokenKind::Refresh => &self.refresh_encoding,
        };

        encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(|e| ServiceError::Internal(format!("Token signing failed: {}", e)))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenFailure> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenFailure::Expired,
                    ErrorKind::Crypto(_) => TokenFailure::Other(e.to_string()),
                    _ => TokenFailure::Invalid,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig::for_testing())
    }

    fn principal() -> Principal {
        Principal {
            id: 7,
            user_id: "user42".to_string(),
            name: "Tester".to_string(),
        }
    }

    #[test]
    fn test_access_round_trip() {
        let codec = codec();
        let token = codec.issue_access(&principal()).unwrap();
        let claims = codec.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.principal, principal());
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_uses_its_own_secret() {
        let codec = codec();
        let refresh = codec.issue_refresh(&principal()).unwrap();
        let claims = codec.verify(&refresh, TokenKind::Refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, 6 * 60 * 60);
        assert_eq!(
            codec.verify(&refresh, TokenKind::Access),
            Err(TokenFailure::Invalid)
        );
    }

    #[test]
    fn test_ephemeral_lifetime() {
        let codec = codec();
        let token = codec.issue_ephemeral(&Principal::forced_logout("user42")).unwrap();
        let claims = codec.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.exp - claims.iat, 5);
        assert!(claims.principal.is_sentinel());
        assert_eq!(claims.principal.name, "auto-logout");
    }

    #[test]
    fn test_expired_distinguished_from_invalid() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let expired = codec
            .sign(TokenKind::Access, &principal(), now - 1000, now - 100)
            .unwrap();
        assert_eq!(
            codec.verify(&expired, TokenKind::Access),
            Err(TokenFailure::Expired)
        );
        assert_eq!(TokenFailure::Expired.status_code(), 401);

        assert_eq!(
            codec.verify("not.a.token", TokenKind::Access),
            Err(TokenFailure::Invalid)
        );
        assert_eq!(TokenFailure::Invalid.status_code(), 402);
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let codec = codec();
        let token = codec.issue_access(&principal()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let payload = &mut parts[1];
        let mid = payload.len() / 2;
        let replacement = if &payload[mid..mid + 1] == "A" { "B" } else { "A" };
        payload.replace_range(mid..mid + 1, replacement);
        let forged = parts.join(".");
        assert_eq!(
            codec.verify(&forged, TokenKind::Access),
            Err(TokenFailure::Invalid)
        );
    }

    #[test]
    fn test_foreign_secret_is_invalid() {
        let mut other = AuthConfig::for_testing();
        other.access_secret = "a-completely-different-access-secret-value".to_string();
        let foreign = TokenCodec::new(&other).issue_access(&principal()).unwrap();
        assert_eq!(
            codec().verify(&foreign, TokenKind::Access),
            Err(TokenFailure::Invalid)
        );
    }

    #[test]
    fn test_claims_shape() {
        let codec = codec();
        let token = codec.issue_access(&principal()).unwrap();
        let claims = codec.verify(&token, TokenKind::Access).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["userId"], "user42");
        assert_eq!(json["name"], "Tester");
        assert!(json["iat"].is_i64());
        assert!(json["exp"].is_i64());
        assert!(claims.remaining_secs() <= 900);
    }
}

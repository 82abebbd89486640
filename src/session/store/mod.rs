/// Session store: logout markers, refresh records and the access-token blacklist
///
/// Every record carries its own TTL and removes itself on expiry; nothing else
/// cleans these keys up. Backends also expose the stream of expired key names
/// through [`ExpirationSource`].

mod memory;
mod redis_store;

pub use memory::MemorySessionStore;
pub use redis_store::RedisSessionStore;

use super::{codec::Principal, keys::StoreAction};
use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

/// Keyed record storage with per-key TTL
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write `value` under `{action}:{owner}` for `ttl_secs` seconds
    async fn put(
        &self,
        action: StoreAction,
        owner: &str,
        value: &Value,
        ttl_secs: u64,
    ) -> ServiceResult<()>;

    /// Read a live record
    async fn get(&self, action: StoreAction, owner: &str) -> ServiceResult<Option<Value>>;

    /// Remove a record, returning how many keys were deleted. Absence is not an error.
    async fn delete(&self, action: StoreAction, owner: &str) -> ServiceResult<u64>;
}

/// Stream of expired key names
pub type KeyEventStream = BoxStream<'static, String>;

/// Source of key-expiration events
#[async_trait]
pub trait ExpirationSource: Send + Sync {
    /// Start receiving expired key names. Each expiry is delivered once,
    /// with no ordering across keys expiring together.
    async fn subscribe(&self) -> ServiceResult<KeyEventStream>;
}

/// Value of a logout marker; only its existence and expiry matter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutMarker {
    pub issued_at: i64,
}

/// Last refresh token issued to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRecord {
    pub refresh_token: String,
}

/// Revoked access token, keyed by the token itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub reason: String,
    pub principal: Principal,
}

/// Serialize and store a typed record
pub async fn put_record<T: Serialize + Sync>(
    store: &dyn SessionStore,
    action: StoreAction,
    owner: &str,
    record: &T,
    ttl_secs: u64,
) -> ServiceResult<()> {
    if ttl_secs == 0 {
        return Err(ServiceError::Validation(
            "Session record TTL must be positive".to_string(),
        ));
    }

    let value = serde_json::to_value(record)
        .map_err(|e| ServiceError::Internal(format!("Record serialization failed: {}", e)))?;
    store.put(action, owner, &value, ttl_secs).await
}

/// Load a typed record.
///
/// A refresh record or logout marker that no longer decodes is dropped and
/// reported absent. An undecodable blacklist entry is an error instead: the
/// token it names stays revoked.
pub async fn get_record<T: DeserializeOwned>(
    store: &dyn SessionStore,
    action: StoreAction,
    owner: &str,
) -> ServiceResult<Option<T>> {
    let Some(value) = store.get(action, owner).await? else {
        return Ok(None);
    };

    match serde_json::from_value(value) {
        Ok(record) => Ok(Some(record)),
        Err(e) if action == StoreAction::Blacklist => {
            error!("Undecodable {} record: {}", action, e);
            Err(ServiceError::Store(format!("Undecodable {} record", action)))
        }
        Err(e) => {
            warn!("Discarding undecodable {} record for {}: {}", action, owner, e);
            if let Err(e) = store.delete(action, owner).await {
                warn!("Failed to discard {} record for {}: {}", action, owner, e);
            }
            Ok(None)
        }
    }
}

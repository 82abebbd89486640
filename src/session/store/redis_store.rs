/// Redis-backed session store
///
/// Records are JSON strings written with `SET EX`. Expiration events come from
/// Redis keyspace notifications on a dedicated pub/sub connection.
use super::{ExpirationSource, KeyEventStream, SessionStore};
use crate::{
    error::{ServiceError, ServiceResult},
    session::keys::{compose_key, StoreAction},
};
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Redis session store client
#[derive(Clone)]
pub struct RedisSessionStore {
    client: Client,
    connection: ConnectionManager,
    database: u32,
}

impl RedisSessionStore {
    /// Connect to Redis
    pub async fn connect(redis_url: &str, database: u32) -> ServiceResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        // The selected database must match the one named in the keyevent channel
        let mut connection_info = redis_url.into_connection_info().map_err(|e| {
            error!("Invalid Redis URL: {}", e);
            ServiceError::Store(format!("Invalid Redis URL: {}", e))
        })?;
        connection_info.redis.db = i64::from(database);

        let client = Client::open(connection_info).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            ServiceError::Store(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client.clone()).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            ServiceError::Store(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self {
            client,
            connection,
            database,
        })
    }

    /// Channel carrying expired key names for the configured database
    pub fn expired_channel(&self) -> String {
        expired_channel(self.database)
    }

    /// Ping Redis to check connection
    pub async fn ping(&self) -> ServiceResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;

        if pong != "PONG" {
            return Err(ServiceError::Store(
                "Unexpected Redis PING response".to_string(),
            ));
        }

        Ok(())
    }
}

fn expired_channel(database: u32) -> String {
    format!("__keyevent@{}__:expired", database)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        action: StoreAction,
        owner: &str,
        value: &Value,
        ttl_secs: u64,
    ) -> ServiceResult<()> {
        let key = compose_key(action, owner);
        debug!("Store SET: {} (TTL: {}s)", key, ttl_secs);

        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(&key, value.to_string(), ttl_secs)
            .await
            .map_err(|e| {
                warn!("Redis SET failed for {}: {}", key, e);
                ServiceError::from(e)
            })?;

        Ok(())
    }

    async fn get(&self, action: StoreAction, owner: &str) -> ServiceResult<Option<Value>> {
        let key = compose_key(action, owner);

        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(&key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", key, e);
            ServiceError::from(e)
        })?;

        match raw {
            Some(json) => {
                debug!("Store HIT: {}", key);
                serde_json::from_str(&json).map(Some).map_err(|e| {
                    ServiceError::Store(format!("Stored value for {} is not JSON: {}", key, e))
                })
            }
            None => {
                debug!("Store MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn delete(&self, action: StoreAction, owner: &str) -> ServiceResult<u64> {
        let key = compose_key(action, owner);
        debug!("Store DELETE: {}", key);

        let mut conn = self.connection.clone();
        let removed: u64 = conn.del(&key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", key, e);
            ServiceError::from(e)
        })?;

        Ok(removed)
    }
}

#[async_trait]
impl ExpirationSource for RedisSessionStore {
    async fn subscribe(&self) -> ServiceResult<KeyEventStream> {
        // Expired-key events are off by default; managed Redis may refuse
        // CONFIG SET, in which case the server must be configured externally.
        let mut conn = self.connection.clone();
        let configured: redis::RedisResult<()> = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("Ex")
            .query_async(&mut conn)
            .await;
        if let Err(e) = configured {
            warn!("Could not enable keyspace expiry notifications: {}", e);
        }

        let channel = self.expired_channel();
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(&channel).await?;
        info!("Subscribed to {}", channel);

        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| {
                let payload = msg.get_payload::<String>();
                if let Err(ref e) = payload {
                    warn!("Ignoring undecodable expiry event: {}", e);
                }
                futures::future::ready(payload.ok())
            })
            .boxed();

        Ok(stream)
    }
}

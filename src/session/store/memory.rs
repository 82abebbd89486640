/// In-process session store for tests and single-node development
///
/// Expiry is observed lazily on access and by `sweep_expired`; every key that
/// expires is published once on a broadcast channel, mirroring Redis keyspace
/// notifications.
use super::{ExpirationSource, KeyEventStream, SessionStore};
use crate::{
    error::{ServiceError, ServiceResult},
    session::keys::{compose_key, StoreAction},
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    deadline: Instant,
}

/// Map-backed session store with TTL and expiry events
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    events: broadcast::Sender<String>,
    fail_writes: Arc<AtomicBool>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            events,
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, key: String) {
        // No subscriber is fine; the event is simply dropped like an
        // unobserved Redis notification.
        let _ = self.events.send(key);
    }

    /// Expire every key whose deadline has passed, returning how many expired
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = {
            let mut entries = self.lock();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                entries.remove(key);
            }
            keys
        };

        let count = expired.len();
        for key in expired {
            self.publish(key);
        }
        count
    }

    /// Expire a record immediately, as if its TTL had run out
    pub fn expire_now(&self, action: StoreAction, owner: &str) -> bool {
        let key = compose_key(action, owner);
        let removed = self.lock().remove(&key).is_some();
        if removed {
            self.publish(key);
        }
        removed
    }

    /// Time left on a live record
    pub fn remaining_ttl(&self, action: StoreAction, owner: &str) -> Option<Duration> {
        let key = compose_key(action, owner);
        let now = Instant::now();
        self.lock()
            .get(&key)
            .filter(|entry| entry.deadline > now)
            .map(|entry| entry.deadline - now)
    }

    /// Make every subsequent write fail, to exercise store-outage paths
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        action: StoreAction,
        owner: &str,
        value: &Value,
        ttl_secs: u64,
    ) -> ServiceResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Store("store unavailable".to_string()));
        }

        let entry = Entry {
            value: value.clone(),
            deadline: Instant::now() + Duration::from_secs(ttl_secs),
        };
        self.lock().insert(compose_key(action, owner), entry);
        Ok(())
    }

    async fn get(&self, action: StoreAction, owner: &str) -> ServiceResult<Option<Value>> {
        let key = compose_key(action, owner);
        let now = Instant::now();

        let (value, expired) = {
            let mut entries = self.lock();
            match entries.get(&key) {
                Some(entry) if entry.deadline > now => (Some(entry.value.clone()), false),
                Some(_) => {
                    entries.remove(&key);
                    (None, true)
                }
                None => (None, false),
            }
        };

        if expired {
            self.publish(key);
        }
        Ok(value)
    }

    async fn delete(&self, action: StoreAction, owner: &str) -> ServiceResult<u64> {
        let key = compose_key(action, owner);
        let now = Instant::now();

        let removed = self.lock().remove(&key);
        match removed {
            Some(entry) if entry.deadline > now => Ok(1),
            Some(_) => {
                self.publish(key);
                Ok(0)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl ExpirationSource for MemorySessionStore {
    async fn subscribe(&self) -> ServiceResult<KeyEventStream> {
        let receiver = self.events.subscribe();

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(key) => return Some((key, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Expiry subscriber lagged, {} events dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(stream.boxed())
    }
}

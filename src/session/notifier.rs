/// Expiration notifier
///
/// Listens to the session store's expired-key stream and turns expired logout
/// markers into forced logouts. Each logout runs on its own task so a slow
/// logout never holds up the stream.
use super::{
    dispatcher::LogoutDispatcher,
    keys::parse_key,
    store::{ExpirationSource, KeyEventStream},
};
use crate::error::ServiceResult;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Where the notifier is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Idle,
    Subscribed,
    Dispatching,
}

/// Forced logout requested by an expiry event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedLogout {
    pub user_id: String,
}

/// Decide what an expired key means. Only logout markers with a non-empty
/// owner trigger a forced logout.
pub fn dispatch_command(key: &str) -> Option<ForcedLogout> {
    let parsed = parse_key(key)?;
    if !parsed.is_session_marker() || parsed.owner.is_empty() {
        return None;
    }

    Some(ForcedLogout {
        user_id: parsed.owner.to_string(),
    })
}

/// Background subscriber feeding the logout dispatcher
pub struct ExpirationNotifier {
    source: Arc<dyn ExpirationSource>,
    dispatcher: Arc<LogoutDispatcher>,
    state: Mutex<NotifierState>,
}

impl ExpirationNotifier {
    pub fn new(source: Arc<dyn ExpirationSource>, dispatcher: Arc<LogoutDispatcher>) -> Self {
        Self {
            source,
            dispatcher,
            state: Mutex::new(NotifierState::Idle),
        }
    }

    pub fn state(&self) -> NotifierState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: NotifierState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Subscribe, then process events on a background task.
    ///
    /// The first subscription happens before this returns, so a store that
    /// cannot deliver expiry events fails startup. Later stream losses are
    /// retried.
    pub async fn start(self: Arc<Self>) -> ServiceResult<JoinHandle<()>> {
        let events = self.source.subscribe().await?;
        self.set_state(NotifierState::Subscribed);
        info!("Listening for expired session keys");

        Ok(tokio::spawn(async move {
            self.run(events).await;
        }))
    }

    async fn run(self: Arc<Self>, mut events: KeyEventStream) {
        loop {
            self.consume(&mut events).await;

            self.set_state(NotifierState::Idle);
            warn!("Expiry event stream ended, resubscribing");

            events = loop {
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                match self.source.subscribe().await {
                    Ok(events) => break events,
                    Err(e) => error!("Resubscribe to expiry events failed: {}", e),
                }
            };
            self.set_state(NotifierState::Subscribed);
            info!("Resubscribed to expired session keys");
        }
    }

    async fn consume(&self, events: &mut KeyEventStream) {
        while let Some(key) = events.next().await {
            let Some(command) = dispatch_command(&key) else {
                debug!("Ignoring expired key {}", key);
                continue;
            };

            self.set_state(NotifierState::Dispatching);
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                dispatcher.force_logout(&command.user_id).await;
            });
            self.set_state(NotifierState::Subscribed);
        }
    }
}

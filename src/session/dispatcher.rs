/// Forced logout of users whose session marker expired
///
/// The dispatcher mints a short-lived token for the synthetic forced-logout
/// principal and hands it to a [`ForcedLogoutPort`]. In production that port
/// calls this service's own logout endpoint over HTTP.
use super::codec::{Principal, TokenCodec};
use crate::error::{ServiceError, ServiceResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const LOGOUT_PATH: &str = "/api/auth/logout";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Performs an authenticated logout with a bearer token
#[async_trait]
pub trait ForcedLogoutPort: Send + Sync {
    async fn logout(&self, bearer_token: &str) -> ServiceResult<()>;
}

/// Logout through the service's own HTTP API
pub struct HttpLogoutPort {
    client: reqwest::Client,
    logout_url: String,
}

impl HttpLogoutPort {
    pub fn new(server_uri: &str) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            logout_url: format!("{}{}", server_uri.trim_end_matches('/'), LOGOUT_PATH),
        })
    }

    pub fn logout_url(&self) -> &str {
        &self.logout_url
    }
}

#[async_trait]
impl ForcedLogoutPort for HttpLogoutPort {
    async fn logout(&self, bearer_token: &str) -> ServiceResult<()> {
        let response = self
            .client
            .post(&self.logout_url)
            .bearer_auth(bearer_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Internal(format!(
                "Logout endpoint answered {}",
                status
            )));
        }

        Ok(())
    }
}

/// Turns an expired session into a logout call
pub struct LogoutDispatcher {
    codec: Arc<TokenCodec>,
    port: Arc<dyn ForcedLogoutPort>,
}

impl LogoutDispatcher {
    pub fn new(codec: Arc<TokenCodec>, port: Arc<dyn ForcedLogoutPort>) -> Self {
        Self { codec, port }
    }

    /// Log `user_id` out. Failures are logged; the account keeps a stale
    /// login flag until the next login clears it.
    pub async fn force_logout(&self, user_id: &str) {
        let principal = Principal::forced_logout(user_id);

        let token = match self.codec.issue_ephemeral(&principal) {
            Ok(token) => token,
            Err(e) => {
                error!("Cannot mint forced-logout token for {}: {}", user_id, e);
                return;
            }
        };

        match self.port.logout(&token).await {
            Ok(()) => info!("Session of {} expired, logged out", user_id),
            Err(e) => error!("Forced logout of {} failed: {}", user_id, e),
        }
    }
}

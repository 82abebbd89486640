/// Application context and dependency injection
use crate::{
    account::{AccountRepository, SqliteAccountRepository},
    config::ServerConfig,
    db,
    error::ServiceResult,
    mailer::{AbnormalAccessNotifier, Mailer},
    session::{ExpirationSource, RedisSessionStore, SessionService, SessionStore, TokenCodec},
};
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub codec: Arc<TokenCodec>,
    pub session_service: Arc<SessionService>,
    /// Expired-key events feeding the forced-logout notifier
    pub expiration_source: Arc<dyn ExpirationSource>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ServiceResult<Self> {
        config.validate()?;

        // Initialize account database
        let account_db =
            db::create_pool(&config.storage.account_db, db::DatabaseOptions::default()).await?;
        db::run_migrations(&account_db).await?;
        db::test_connection(&account_db).await?;
        let accounts = Arc::new(SqliteAccountRepository::new(account_db));

        // Session store and its expiry events share one Redis client
        let store = RedisSessionStore::connect(&config.redis.url, config.redis.database).await?;
        store.ping().await?;

        let mailer = Mailer::new(config.email.clone(), config.service.server_uri.clone())?;
        if !mailer.is_configured() {
            tracing::warn!("SMTP not configured, abnormal-access alerts will only be logged");
        }

        Ok(Self::from_parts(
            config,
            accounts,
            Arc::new(store.clone()),
            Arc::new(store),
            Arc::new(mailer),
        ))
    }

    /// Assemble a context from already-built collaborators
    pub fn from_parts(
        config: ServerConfig,
        accounts: Arc<dyn AccountRepository>,
        store: Arc<dyn SessionStore>,
        expiration_source: Arc<dyn ExpirationSource>,
        notifier: Arc<dyn AbnormalAccessNotifier>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.authentication));
        let session_service = Arc::new(SessionService::new(
            accounts,
            store,
            codec.clone(),
            notifier,
            config.authentication.bcrypt_cost,
        ));

        Self {
            config: Arc::new(config),
            codec,
            session_service,
            expiration_source,
        }
    }

    /// Whether cookies carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.is_production()
    }
}

/// Session Keeper - authentication backend
///
/// Dual-token login with Redis-backed sessions, automatic logout when a
/// session expires, and refresh-token theft detection.
use session_keeper::{
    config::ServerConfig,
    context::AppContext,
    error::ServiceResult,
    server,
    session::{ExpirationNotifier, HttpLogoutPort, LogoutDispatcher},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ServiceResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Expired session markers turn into logout calls against this server
    let port = Arc::new(HttpLogoutPort::new(&ctx.config.service.server_uri)?);
    let dispatcher = Arc::new(LogoutDispatcher::new(ctx.codec.clone(), port));
    let notifier = Arc::new(ExpirationNotifier::new(
        ctx.expiration_source.clone(),
        dispatcher,
    ));
    let _notifier_task = notifier.start().await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

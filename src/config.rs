/// Configuration management for Session Keeper
use crate::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub authentication: AuthConfig,
    pub redis: RedisConfig,
    pub storage: StorageConfig,
    pub email: Option<EmailConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL this service is reachable at; forced logout calls back into it
    pub server_uri: String,
    /// Front-end URL the account re-activation page returns to
    pub client_uri: String,
    pub environment: String,
}

/// Token and password configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token lifetime in seconds
    pub access_ttl: u64,
    /// Refresh token lifetime in seconds; also the TTL of stored session records
    pub refresh_ttl: u64,
    /// Lifetime of the synthetic forced-logout token
    pub ephemeral_ttl: u64,
    pub bcrypt_cost: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Database index, used to build the keyevent channel name
    pub database: u32,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub account_db: PathBuf,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl AuthConfig {
    /// Settings suitable for tests and local tooling
    pub fn for_testing() -> Self {
        Self {
            access_secret: "access-secret-for-tests-0123456789abcdef".to_string(),
            refresh_secret: "refresh-secret-for-tests-0123456789abcdef".to_string(),
            access_ttl: 900,
            refresh_ttl: 6 * 60 * 60,
            ephemeral_ttl: 5,
            bcrypt_cost: 4,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ServiceResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ServiceError::Validation("Invalid port number".to_string()))?;
        let server_uri =
            env::var("SERVER_URI").unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let client_uri = env::var("CLIENT_URI").unwrap_or_else(|_| server_uri.clone());
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let access_secret = env::var("ACCESS_SECRET")
            .map_err(|_| ServiceError::Validation("ACCESS_SECRET required".to_string()))?;
        let refresh_secret = env::var("REFRESH_SECRET")
            .map_err(|_| ServiceError::Validation("REFRESH_SECRET required".to_string()))?;
        let access_ttl = env::var("ACCESS_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);
        let refresh_ttl = env::var("REFRESH_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "21600".to_string())
            .parse()
            .unwrap_or(21600);
        let ephemeral_ttl = env::var("EPHEMERAL_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let bcrypt_cost = env::var("BCRYPT_COST")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let redis_database = env::var("REDIS_DATABASE")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);

        let account_db = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/accounts.sqlite"));

        let email = if let Ok(smtp_url) = env::var("SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "session_keeper=debug,tower_http=debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                server_uri,
                client_uri,
                environment,
            },
            authentication: AuthConfig {
                access_secret,
                refresh_secret,
                access_ttl,
                refresh_ttl,
                ephemeral_ttl,
                bcrypt_cost,
            },
            redis: RedisConfig {
                url: redis_url,
                database: redis_database,
            },
            storage: StorageConfig { account_db },
            email,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ServiceResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ServiceError::Validation("Hostname cannot be empty".to_string()));
        }

        let auth = &self.authentication;
        if auth.access_secret.len() < 32 || auth.refresh_secret.len() < 32 {
            return Err(ServiceError::Validation(
                "Token secrets must be at least 32 characters".to_string(),
            ));
        }

        if auth.access_secret == auth.refresh_secret {
            return Err(ServiceError::Validation(
                "Access and refresh secrets must differ".to_string(),
            ));
        }

        if auth.ephemeral_ttl == 0 || auth.access_ttl <= auth.ephemeral_ttl {
            return Err(ServiceError::Validation(
                "Ephemeral token lifetime must be shorter than the access lifetime".to_string(),
            ));
        }

        if auth.refresh_ttl <= auth.access_ttl {
            return Err(ServiceError::Validation(
                "Refresh token lifetime must exceed the access lifetime".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether cookies should carry the `Secure` attribute
    pub fn is_production(&self) -> bool {
        matches!(self.service.environment.as_str(), "production" | "prod")
    }
}

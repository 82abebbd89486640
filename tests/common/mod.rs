//! Shared fixtures for the HTTP-level tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use session_keeper::{
    account::MemoryAccountRepository,
    config::{
        AuthConfig, LoggingConfig, RedisConfig, ServerConfig, ServiceConfig, StorageConfig,
    },
    context::AppContext,
    db::account::Account,
    error::{ServiceError, ServiceResult},
    mailer::AbnormalAccessNotifier,
    server::build_router,
    session::MemorySessionStore,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const VERIFICATION_CODE: &str = "Ab3!x9Qz";

/// Notifier that records alerts instead of mailing them
#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl AbnormalAccessNotifier for RecordingNotifier {
    async fn notify(&self, account: &Account, client_ip: Option<&str>) -> ServiceResult<String> {
        self.alerts
            .lock()
            .map_err(|e| ServiceError::Internal(e.to_string()))?
            .push((account.user_id.clone(), client_ip.map(str::to_string)));
        Ok(VERIFICATION_CODE.to_string())
    }
}

pub struct TestApp {
    pub ctx: AppContext,
    pub router: Router,
    pub accounts: MemoryAccountRepository,
    pub store: MemorySessionStore,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 3000,
            server_uri: "http://127.0.0.1:3000".to_string(),
            client_uri: "http://127.0.0.1:5173".to_string(),
            environment: "development".to_string(),
        },
        authentication: AuthConfig::for_testing(),
        redis: RedisConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            database: 0,
        },
        storage: StorageConfig {
            account_db: PathBuf::from("unused.sqlite"),
        },
        email: None,
        logging: LoggingConfig {
            level: "session_keeper=debug".to_string(),
        },
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let accounts = MemoryAccountRepository::new();
        let store = MemorySessionStore::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = AppContext::from_parts(
            config,
            Arc::new(accounts.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            notifier.clone(),
        );
        let router = build_router(ctx.clone());

        Self {
            ctx,
            router,
            accounts,
            store,
            notifier,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<String>, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        decode(response).await
    }

    pub async fn signup(&self, user_id: &str) {
        let (status, _, _) = self
            .send(json_request(
                "POST",
                "/api/auth/signup",
                serde_json::json!({
                    "userId": user_id,
                    "email": format!("{}@example.com", user_id),
                    "name": "Tester",
                    "password": "password123",
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    /// Log in and return (access token, refresh token)
    pub async fn login(&self, user_id: &str) -> (String, String) {
        let (status, cookies, body) = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                serde_json::json!({"userId": user_id, "password": "password123"}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        let access = body["accessToken"].as_str().unwrap().to_string();
        let refresh = refresh_cookie_value(&cookies).expect("refresh cookie set");
        (access, refresh)
    }
}

pub async fn decode(response: Response<Body>) -> (StatusCode, Vec<String>, serde_json::Value) {
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, cookies, body)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn reissue_request(access_token: &str, refresh_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/reissue")
        .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
        .header(header::COOKIE, format!("refreshToken={}", refresh_token))
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::empty())
        .unwrap()
}

pub fn refresh_cookie_value(cookies: &[String]) -> Option<String> {
    cookies.iter().find_map(|c| {
        c.strip_prefix("refreshToken=")
            .and_then(|rest| rest.split(';').next())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

pub fn clears_refresh_cookie(cookies: &[String]) -> bool {
    cookies
        .iter()
        .any(|c| c.starts_with("refreshToken=;") && c.contains("Max-Age=0"))
}

/// HTTP-level tests for the /api/auth endpoints
mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::*;
use session_keeper::session::{keys::StoreAction, Principal, SessionStore, TokenKind};
use tower::ServiceExt;

fn expired_access_token(app: &TestApp, user_id: &str) -> String {
    let account = app.accounts.snapshot(user_id).unwrap();
    let principal = Principal {
        id: account.id,
        user_id: account.user_id,
        name: account.name,
    };
    let now = Utc::now().timestamp();
    app.ctx
        .codec
        .sign(TokenKind::Access, &principal, now - 1000, now - 100)
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, _, body) = app
        .send(
            axum::http::Request::get("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_signup_conflict_and_validation() {
    let app = TestApp::new();
    app.signup("user42").await;

    let (status, _, body) = app
        .send(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({
                "userId": "user42",
                "email": "again@example.com",
                "name": "Again",
                "password": "password123",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _, body) = app
        .send(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({
                "userId": "user43",
                "email": "broken",
                "name": "Broken",
                "password": "password123",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("email"));

    let (status, _, body) = app
        .send(json_request(
            "POST",
            "/api/auth/signup",
            serde_json::json!({
                "userId": "user:43",
                "email": "user43@example.com",
                "name": "Colon",
                "password": "password123",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("user_id"));
    assert!(app.accounts.snapshot("user:43").is_none());
}

#[tokio::test]
async fn test_login_sets_refresh_cookie() {
    let app = TestApp::new();
    app.signup("user42").await;

    let (status, cookies, body) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"userId": "user42", "password": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["userId"], "user42");
    assert_eq!(body["user"]["isLoggedIn"], true);
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["accessToken"].is_string());

    let cookie = cookies
        .iter()
        .find(|c| c.starts_with("refreshToken="))
        .unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=21600"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_secure_cookie_in_production() {
    let mut config = test_config();
    config.service.environment = "production".to_string();
    let app = TestApp::with_config(config);
    app.signup("user42").await;

    let (_, cookies, _) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"userId": "user42", "password": "password123"}),
        ))
        .await;
    assert!(cookies.iter().any(|c| c.contains("Secure")));
}

#[tokio::test]
async fn test_wrong_password_reports_remaining_attempts() {
    let app = TestApp::new();
    app.signup("user42").await;

    let (status, _, body) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"userId": "user42", "password": "not-the-password"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["remainingAttempts"], 4);

    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"userId": "ghost", "password": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_login_rejected() {
    let app = TestApp::new();
    app.signup("user42").await;
    app.login("user42").await;

    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({"userId": "user42", "password": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gateway_rejections() {
    let app = TestApp::new();
    app.signup("user42").await;
    let (access, _) = app.login("user42").await;

    let (status, _, body) = app
        .send(
            axum::http::Request::post("/api/auth/logout")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Already logged out");

    let (status, _, body) = app
        .send(
            axum::http::Request::post("/api/auth/verify-token")
                .header("authorization", access.clone())
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Malformed authorization header");

    let (status, _, _) = app
        .send(bearer_request("POST", "/api/auth/verify-token", "not.a.token"))
        .await;
    assert_eq!(status.as_u16(), 402);

    let expired = expired_access_token(&app, "user42");
    let (status, _, _) = app
        .send(bearer_request("POST", "/api/auth/verify-token", &expired))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = app
        .send(bearer_request("POST", "/api/auth/verify-token", &access))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], true);
    assert_eq!(body["user"]["userId"], "user42");
}

#[tokio::test]
async fn test_logout_revokes_access_token() {
    let app = TestApp::new();
    app.signup("user42").await;
    let (access, _) = app.login("user42").await;

    let (status, cookies, body) = app
        .send(bearer_request("POST", "/api/auth/logout", &access))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(clears_refresh_cookie(&cookies));
    assert!(!app.accounts.snapshot("user42").unwrap().is_logged_in);

    // Still signed and unexpired, but blacklisted
    let (status, _, body) = app
        .send(bearer_request("POST", "/api/auth/verify-token", &access))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Token has been logged out");

    // Logged out accounts can log in again
    app.login("user42").await;
}

#[tokio::test]
async fn test_corrupted_blacklist_entry_still_rejects_token() {
    let app = TestApp::new();
    app.signup("user42").await;
    let (access, _) = app.login("user42").await;

    app.store
        .put(StoreAction::Blacklist, &access, &serde_json::json!(42), 60)
        .await
        .unwrap();

    let (status, _, body) = app
        .send(bearer_request("POST", "/api/auth/verify-token", &access))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(body["isValid"], true);
}

#[tokio::test]
async fn test_reissue_requires_expired_access_token() {
    let app = TestApp::new();
    app.signup("user42").await;
    let (access, refresh) = app.login("user42").await;

    let (status, cookies, _) = app.send(reissue_request(&access, &refresh)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(clears_refresh_cookie(&cookies));

    let (status, _, _) = app.send(reissue_request("garbage", &refresh)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = app
        .send(bearer_request("POST", "/api/auth/reissue", &access))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing was locked by the rejected attempts
    assert!(app.accounts.snapshot("user42").unwrap().is_active);
}

#[tokio::test]
async fn test_reissue_with_matching_refresh_token() {
    let app = TestApp::new();
    app.signup("user42").await;
    let (_, refresh) = app.login("user42").await;
    let expired = expired_access_token(&app, "user42");

    let (status, cookies, body) = app.send(reissue_request(&expired, &refresh)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let new_access = body["accessToken"].as_str().unwrap();
    let new_refresh = refresh_cookie_value(&cookies).unwrap();

    let claims = app.ctx.codec.verify(new_access, TokenKind::Access).unwrap();
    assert_eq!(claims.principal.user_id, "user42");
    app.ctx
        .codec
        .verify(&new_refresh, TokenKind::Refresh)
        .unwrap();
}

#[tokio::test]
async fn test_reissue_without_stored_record() {
    let app = TestApp::new();
    app.signup("user42").await;
    let (_, refresh) = app.login("user42").await;
    app.store.expire_now(StoreAction::Refresh, "user42");
    let expired = expired_access_token(&app, "user42");

    let (status, _, _) = app.send(reissue_request(&expired, &refresh)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_theft_locks_and_reactivates() {
    let app = TestApp::new();
    app.signup("user42").await;
    let (_, refresh) = app.login("user42").await;
    let expired = expired_access_token(&app, "user42");

    // A validly signed refresh token that is not the one last issued
    let account = app.accounts.snapshot("user42").unwrap();
    let now = Utc::now().timestamp();
    let replayed = app
        .ctx
        .codec
        .sign(
            TokenKind::Refresh,
            &Principal {
                id: account.id,
                user_id: account.user_id.clone(),
                name: account.name.clone(),
            },
            now - 60,
            now + 3600,
        )
        .unwrap();
    assert_ne!(replayed, refresh);

    let (status, cookies, body) = app.send(reissue_request(&expired, &replayed)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Abnormal access");
    assert!(clears_refresh_cookie(&cookies));

    let locked = app.accounts.snapshot("user42").unwrap();
    assert!(!locked.is_active);
    assert!(!locked.is_logged_in);
    assert_eq!(
        app.notifier.alerts.lock().unwrap().as_slice(),
        &[("user42".to_string(), Some("203.0.113.9".to_string()))]
    );

    // The legitimate refresh token is dead too
    let (status, _, _) = app.send(reissue_request(&expired, &refresh)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let verify_uri = format!(
        "/api/auth/verify?userId=user42&code={}",
        urlencoding::encode(VERIFICATION_CODE)
    );

    let (status, _, _) = app
        .send(json_request(
            "POST",
            &verify_uri,
            serde_json::json!({"userId": "someone-else", "userPassword": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = app
        .send(json_request(
            "POST",
            "/api/auth/verify?userId=user42&code=wrong",
            serde_json::json!({"userId": "user42", "userPassword": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = app
        .send(json_request(
            "POST",
            &verify_uri,
            serde_json::json!({"userId": "user42", "userPassword": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["isActive"], true);

    app.login("user42").await;
}

#[tokio::test]
async fn test_verification_link_serves_page() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(
            axum::http::Request::get("/api/auth/verify?userId=user42&code=Ab3%21x9Qz")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let page = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(page.to_vec()).unwrap();
    assert!(page.contains(r#"const redirectUrl = "http://127.0.0.1:5173";"#));

    let (status, _, _) = app
        .send(
            axum::http::Request::get("/api/auth/verify?userId=user42")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user() {
    let app = TestApp::new();
    app.signup("user42").await;
    app.signup("user43").await;
    let (access, _) = app.login("user42").await;

    let (status, _, _) = app
        .send(bearer_request("DELETE", "/api/auth/users/user43", &access))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = app
        .send(bearer_request("DELETE", "/api/auth/users/user42", &access))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.accounts.snapshot("user42").is_none());

    let (status, _, _) = app
        .send(bearer_request("DELETE", "/api/auth/users/user42", &access))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::new();
    let (status, _, body) = app
        .send(
            axum::http::Request::get("/nope")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

/// /api/auth endpoints
use crate::{
    account::{LoginRequest, SignupRequest, VerifyAccountQuery, VerifyAccountRequest},
    auth::{AuthUser, ClientIp, RefreshAuth, REFRESH_COOKIE},
    context::AppContext,
    error::{ServiceError, ServiceResult},
    session::{LoginOutcome, LogoutOutcome, ReissueOutcome},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/reissue", post(reissue))
        .route("/api/auth/verify-token", post(verify_token))
        .route("/api/auth/verify", get(verify_page).post(verify_account))
        .route("/api/auth/users/:user_id", delete(delete_user))
}

fn refresh_cookie(ctx: &AppContext, refresh_token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, refresh_token))
        .path("/")
        .http_only(true)
        .secure(ctx.secure_cookies())
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(
            ctx.config.authentication.refresh_ttl as i64,
        ))
        .build()
}

/// Expire the refresh cookie whether or not the request carried it
fn clear_refresh_cookie(jar: CookieJar) -> CookieJar {
    jar.add(
        Cookie::build((REFRESH_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::ZERO)
            .build(),
    )
}

/// Body for recoverable failures that are not raised as errors
fn failure(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
            "message": message,
        })),
    )
        .into_response()
}

async fn signup(
    State(ctx): State<AppContext>,
    Json(req): Json<SignupRequest>,
) -> ServiceResult<(StatusCode, Json<serde_json::Value>)> {
    let user = ctx.session_service.signup(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Signup complete",
            "user": user,
        })),
    ))
}

async fn login(
    State(ctx): State<AppContext>,
    ClientIp(client_ip): ClientIp,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ServiceResult<Response> {
    let outcome = ctx
        .session_service
        .login(client_ip.as_deref(), &req.user_id, &req.password)
        .await?;

    match outcome {
        LoginOutcome::Success(session) => {
            let jar = jar.add(refresh_cookie(&ctx, session.tokens.refresh_token));
            Ok((
                jar,
                Json(json!({
                    "success": true,
                    "message": "Login successful",
                    "user": session.user,
                    "accessToken": session.tokens.access_token,
                })),
            )
                .into_response())
        }
        LoginOutcome::WrongPassword { remaining_attempts } => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "WrongPassword",
                "message": "Invalid user id or password",
                "remainingAttempts": remaining_attempts,
            })),
        )
            .into_response()),
    }
}

async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    jar: CookieJar,
) -> ServiceResult<Response> {
    match ctx.session_service.logout(&auth.claims, &auth.token).await? {
        LogoutOutcome::LoggedOut(_) => Ok((
            clear_refresh_cookie(jar),
            Json(json!({
                "success": true,
                "message": "Logged out",
            })),
        )
            .into_response()),
        LogoutOutcome::UserNotFound => Ok(failure(
            StatusCode::NOT_FOUND,
            "NotFound",
            "Logged-in user not found",
        )),
    }
}

async fn reissue(
    State(ctx): State<AppContext>,
    auth: Result<RefreshAuth, ServiceError>,
    jar: CookieJar,
) -> Response {
    let result = match auth {
        Ok(auth) => {
            ctx.session_service
                .reissue_access_token(&auth.principal, &auth.refresh_token, auth.client_ip.as_deref())
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(ReissueOutcome::Reissued(tokens)) => {
            let jar = jar.add(refresh_cookie(&ctx, tokens.refresh_token));
            (
                jar,
                Json(json!({
                    "success": true,
                    "message": "Issued new tokens",
                    "accessToken": tokens.access_token,
                })),
            )
                .into_response()
        }
        Ok(ReissueOutcome::NoRefreshToken) => failure(
            StatusCode::NOT_FOUND,
            "NotFound",
            "No refresh token stored, log in again",
        ),
        Err(e) if e.status() == StatusCode::FORBIDDEN => {
            (clear_refresh_cookie(jar), e).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn verify_token(auth: AuthUser) -> Json<serde_json::Value> {
    Json(json!({
        "isValid": true,
        "user": auth.claims,
    }))
}

/// Re-activation form served at the emailed link. It posts back to the same
/// URL and returns to the client app once the account is active.
const VERIFY_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Re-activate account</title>
</head>
<body>
<h1>Re-activate your account</h1>
<form id="verify">
  <label>User ID <input name="userId" required></label>
  <label>Password <input name="userPassword" type="password" required></label>
  <button type="submit">Re-activate</button>
</form>
<p id="status"></p>
<script>
const redirectUrl = __REDIRECT_URL__;
const form = document.getElementById("verify");
form.userId.value = new URLSearchParams(location.search).get("userId") || "";
form.addEventListener("submit", async (event) => {
  event.preventDefault();
  const response = await fetch(location.pathname + location.search, {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify({ userId: form.userId.value, userPassword: form.userPassword.value }),
  });
  if (response.ok) {
    location.href = redirectUrl;
  } else {
    const body = await response.json().catch(() => ({}));
    document.getElementById("status").textContent = body.message || "Re-activation failed";
  }
});
</script>
</body>
</html>
"#;

async fn verify_page(
    State(ctx): State<AppContext>,
    Query(query): Query<VerifyAccountQuery>,
) -> ServiceResult<Html<String>> {
    if query.user_id.is_none() || query.code.is_none() {
        return Err(ServiceError::Validation("Invalid request".to_string()));
    }

    let redirect_url = serde_json::to_string(&ctx.config.service.client_uri)
        .map_err(|e| ServiceError::Internal(e.to_string()))?
        .replace("</", "<\\/");
    Ok(Html(VERIFY_PAGE.replace("__REDIRECT_URL__", &redirect_url)))
}

async fn verify_account(
    State(ctx): State<AppContext>,
    Query(query): Query<VerifyAccountQuery>,
    Json(req): Json<VerifyAccountRequest>,
) -> ServiceResult<Json<serde_json::Value>> {
    let (Some(user_id), Some(code)) = (query.user_id, query.code) else {
        return Err(ServiceError::Validation("Invalid request".to_string()));
    };
    if user_id != req.user_id || req.user_password.is_empty() {
        return Err(ServiceError::Validation("Invalid request".to_string()));
    }

    let user = ctx
        .session_service
        .verify_account(&req.user_id, &req.user_password, &code)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Account re-activated",
        "user": user,
    })))
}

async fn delete_user(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(user_id): Path<String>,
) -> ServiceResult<Json<serde_json::Value>> {
    if auth.principal().user_id != user_id {
        return Err(ServiceError::Authorization(
            "Cannot delete another user".to_string(),
        ));
    }

    ctx.session_service.delete_user(&user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted",
    })))
}

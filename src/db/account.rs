/// Account database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account record in the database
///
/// The password hash and verification code never leave the server: both are
/// skipped when the record is serialized into a response.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub user_id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_logged_in: bool,
    pub is_active: bool,
    pub failed_login_attempts: i64,
    pub last_login_datetime: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    #[serde(skip_serializing, default)]
    pub verification_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

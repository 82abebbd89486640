/// Account management
///
/// The authentication core reads and writes accounts only through the
/// [`AccountRepository`] trait; it never owns the account table.

mod memory;
pub mod password;
mod repository;

pub use memory::MemoryAccountRepository;
pub use repository::SqliteAccountRepository;

use crate::{
    db::account::{Account, NewAccount},
    error::ServiceResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Account persistence used by the session service
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Load an account with the password hash blanked
    async fn find_by_user_id(&self, user_id: &str) -> ServiceResult<Option<Account>>;

    /// Load an account including its password hash
    async fn find_by_user_id_with_password(&self, user_id: &str)
        -> ServiceResult<Option<Account>>;

    /// Insert a new account
    async fn create(&self, account: NewAccount) -> ServiceResult<Account>;

    /// Persist mutable account state. The password hash is never written.
    async fn update(&self, account: &Account) -> ServiceResult<Account>;

    /// Delete by user id, returning whether a row was removed
    async fn delete(&self, user_id: &str) -> ServiceResult<bool>;
}

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_user_id"))]
    pub user_id: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// User ids become store key segments, so they may not contain the `:` separator
fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.contains(':') {
        return Err(ValidationError::new("user_id_separator"));
    }
    Ok(())
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

/// Account re-activation request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAccountRequest {
    pub user_id: String,
    pub user_password: String,
}

/// Account re-activation query parameters (from the emailed link)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAccountQuery {
    pub user_id: Option<String>,
    pub code: Option<String>,
}

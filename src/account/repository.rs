/// SQLite-backed account repository
/// Uses sqlx runtime queries so no DATABASE_URL is needed at compile time
use super::AccountRepository;
use crate::{
    db::account::{Account, NewAccount},
    error::{ServiceError, ServiceResult},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

const ACCOUNT_COLUMNS: &str = "id, user_id, email, name, password_hash, is_logged_in, is_active,
     failed_login_attempts, last_login_datetime, ip_address, verification_code, created_at";

/// Account repository over the account database
#[derive(Clone)]
pub struct SqliteAccountRepository {
    db: SqlitePool,
}

impl SqliteAccountRepository {
    /// Create a new repository
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn fetch(&self, user_id: &str) -> ServiceResult<Option<Account>> {
        let query = format!("SELECT {} FROM account WHERE user_id = ?1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }
}

#[async_trait]
impl AccountRepository for SqliteAccountRepository {
    async fn find_by_user_id(&self, user_id: &str) -> ServiceResult<Option<Account>> {
        Ok(self.fetch(user_id).await?.map(|mut account| {
            account.password_hash.clear();
            account
        }))
    }

    async fn find_by_user_id_with_password(
        &self,
        user_id: &str,
    ) -> ServiceResult<Option<Account>> {
        self.fetch(user_id).await
    }

    async fn create(&self, account: NewAccount) -> ServiceResult<Account> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO account (user_id, email, name, password_hash, is_logged_in, is_active,
                                  failed_login_attempts, created_at)
             VALUES (?1, ?2, ?3, ?4, FALSE, TRUE, 0, ?5)",
        )
        .bind(&account.user_id)
        .bind(&account.email)
        .bind(&account.name)
        .bind(&account.password_hash)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ServiceError::Conflict("User already exists".to_string())
            }
            other => ServiceError::Database(other),
        })?;

        Ok(Account {
            id: result.last_insert_rowid(),
            user_id: account.user_id,
            email: account.email,
            name: account.name,
            password_hash: String::new(),
            is_logged_in: false,
            is_active: true,
            failed_login_attempts: 0,
            last_login_datetime: None,
            ip_address: None,
            verification_code: None,
            created_at: now,
        })
    }

    async fn update(&self, account: &Account) -> ServiceResult<Account> {
        let result = sqlx::query(
            "UPDATE account
             SET email = ?1, name = ?2, is_logged_in = ?3, is_active = ?4,
                 failed_login_attempts = ?5, last_login_datetime = ?6, ip_address = ?7,
                 verification_code = ?8
             WHERE id = ?9",
        )
        .bind(&account.email)
        .bind(&account.name)
        .bind(account.is_logged_in)
        .bind(account.is_active)
        .bind(account.failed_login_attempts)
        .bind(account.last_login_datetime)
        .bind(&account.ip_address)
        .bind(&account.verification_code)
        .bind(account.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound(format!(
                "Account {} not found",
                account.user_id
            )));
        }

        let mut updated = account.clone();
        updated.password_hash.clear();
        Ok(updated)
    }

    async fn delete(&self, user_id: &str) -> ServiceResult<bool> {
        let result = sqlx::query("DELETE FROM account WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory account repository for tests and local tooling
use super::AccountRepository;
use crate::{
    db::account::{Account, NewAccount},
    error::{ServiceError, ServiceResult},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Account repository held in a map keyed by user id
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountRepository {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    next_id: Arc<AtomicI64>,
    fail_updates: Arc<AtomicBool>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a fully specified account, replacing any existing one
    pub fn insert(&self, account: Account) {
        self.lock().insert(account.user_id.clone(), account);
    }

    /// Current stored state, including the password hash
    pub fn snapshot(&self, user_id: &str) -> Option<Account> {
        self.lock().get(user_id).cloned()
    }

    /// Make every subsequent `update` fail with a database-style error
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn find_by_user_id(&self, user_id: &str) -> ServiceResult<Option<Account>> {
        Ok(self.snapshot(user_id).map(|mut account| {
            account.password_hash.clear();
            account
        }))
    }

    async fn find_by_user_id_with_password(
        &self,
        user_id: &str,
    ) -> ServiceResult<Option<Account>> {
        Ok(self.snapshot(user_id))
    }

    async fn create(&self, account: NewAccount) -> ServiceResult<Account> {
        let mut accounts = self.lock();
        if accounts.contains_key(&account.user_id) {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }

        let created = Account {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: account.user_id,
            email: account.email,
            name: account.name,
            password_hash: account.password_hash,
            is_logged_in: false,
            is_active: true,
            failed_login_attempts: 0,
            last_login_datetime: None,
            ip_address: None,
            verification_code: None,
            created_at: Utc::now(),
        };
        accounts.insert(created.user_id.clone(), created.clone());

        let mut returned = created;
        returned.password_hash.clear();
        Ok(returned)
    }

    async fn update(&self, account: &Account) -> ServiceResult<Account> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal("account update failed".to_string()));
        }

        let mut accounts = self.lock();
        let stored = accounts
            .get_mut(&account.user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Account {} not found", account.user_id)))?;

        let password_hash = std::mem::take(&mut stored.password_hash);
        *stored = Account {
            password_hash,
            ..account.clone()
        };

        let mut updated = account.clone();
        updated.password_hash.clear();
        Ok(updated)
    }

    async fn delete(&self, user_id: &str) -> ServiceResult<bool> {
        Ok(self
            .lock()
            .remove(user_id)
            .is_some())
    }
}

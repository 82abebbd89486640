/// Session service: login, logout, token reissue and theft detection
///
/// Business results a caller must branch on (wrong password, missing user,
/// missing refresh record) come back as outcome enums. Everything else is a
/// [`ServiceError`] carrying its HTTP status.
use super::{
    codec::{Claims, Principal, TokenCodec, TokenPair},
    keys::StoreAction,
    store::{get_record, put_record, BlacklistEntry, LogoutMarker, RefreshRecord, SessionStore},
};
use crate::{
    account::{
        password::{hash_password, verify_password},
        AccountRepository, SignupRequest,
    },
    db::account::{Account, NewAccount},
    error::{ServiceError, ServiceResult},
    mailer::AbnormalAccessNotifier,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use validator::Validate;

/// Consecutive password failures that disable an account
pub const MAX_FAILED_ATTEMPTS: i64 = 5;

/// Message for every theft-detection rejection, whatever the cause
pub const ABNORMAL_ACCESS: &str = "Abnormal access";

const BLACKLIST_REASON: &str = "Token has been logged out";

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginSession {
    /// Account after login, password hash blanked
    pub user: Account,
    pub tokens: TokenPair,
}

/// Result of a login attempt that did not raise
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success(LoginSession),
    WrongPassword { remaining_attempts: i64 },
}

/// Result of a logout that did not raise
#[derive(Debug, Clone)]
pub enum LogoutOutcome {
    LoggedOut(Account),
    UserNotFound,
}

/// Result of a reissue that did not raise
#[derive(Debug, Clone)]
pub enum ReissueOutcome {
    Reissued(TokenPair),
    NoRefreshToken,
}

/// Orchestrates account state, tokens and session records
pub struct SessionService {
    accounts: Arc<dyn AccountRepository>,
    store: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
    notifier: Arc<dyn AbnormalAccessNotifier>,
    bcrypt_cost: u32,
}

impl SessionService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        store: Arc<dyn SessionStore>,
        codec: Arc<TokenCodec>,
        notifier: Arc<dyn AbnormalAccessNotifier>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            accounts,
            store,
            codec,
            notifier,
            bcrypt_cost,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Register a new account
    pub async fn signup(&self, request: SignupRequest) -> ServiceResult<Account> {
        if let Err(errors) = request.validate() {
            let mut fields: Vec<String> =
                errors.field_errors().keys().map(|k| k.to_string()).collect();
            fields.sort_unstable();
            return Err(ServiceError::Validation(format!(
                "Invalid input: {}",
                fields.join(", ")
            )));
        }

        if self.accounts.find_by_user_id(&request.user_id).await?.is_some() {
            return Err(ServiceError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(&request.password, self.bcrypt_cost)?;
        let account = self
            .accounts
            .create(NewAccount {
                user_id: request.user_id,
                email: request.email,
                name: request.name,
                password_hash,
            })
            .await?;

        info!("Created account {}", account.user_id);
        Ok(account)
    }

    /// Authenticate with a password and open the single allowed session
    pub async fn login(
        &self,
        client_ip: Option<&str>,
        user_id: &str,
        password: &str,
    ) -> ServiceResult<LoginOutcome> {
        let mut account = self
            .accounts
            .find_by_user_id_with_password(user_id)
            .await?
            .ok_or_else(|| ServiceError::Authentication("User not found".to_string()))?;

        if !account.is_active {
            return Err(ServiceError::Authentication(
                "Account is disabled, contact an administrator".to_string(),
            ));
        }

        if account.is_logged_in {
            self.recover_stale_login(&mut account).await?;
        }

        if !verify_password(password, &account.password_hash)? {
            account.failed_login_attempts += 1;
            account.last_login_datetime = Some(Utc::now());

            if account.failed_login_attempts >= MAX_FAILED_ATTEMPTS {
                account.is_active = false;
                self.accounts.update(&account).await?;
                warn!("Disabled {} after {} failed logins", user_id, MAX_FAILED_ATTEMPTS);
                return Err(ServiceError::Authentication(format!(
                    "Account disabled after {} failed password attempts",
                    MAX_FAILED_ATTEMPTS
                )));
            }

            self.accounts.update(&account).await?;
            return Ok(LoginOutcome::WrongPassword {
                remaining_attempts: MAX_FAILED_ATTEMPTS - account.failed_login_attempts,
            });
        }

        account.failed_login_attempts = 0;
        account.last_login_datetime = Some(Utc::now());
        account.ip_address = client_ip.map(str::to_string);
        account.is_logged_in = true;
        let mut user = self.accounts.update(&account).await?;
        user.password_hash.clear();

        let principal = principal_of(&user);
        let tokens = self.codec.issue_pair(&principal)?;

        if let Err(e) = self.store_session(user_id, &tokens.refresh_token).await {
            warn!("Failed to store session records for {}: {}", user_id, e);
        }

        info!("User {} logged in", user_id);
        Ok(LoginOutcome::Success(LoginSession { user, tokens }))
    }

    /// A set `isLoggedIn` flag is honored only while the logout marker lives.
    /// Once the marker is gone the forced logout was lost, so the flag is stale.
    async fn recover_stale_login(&self, account: &mut Account) -> ServiceResult<()> {
        let already_logged_in =
            || ServiceError::Authentication("Already logged in on another device".to_string());

        match get_record::<LogoutMarker>(self.store.as_ref(), StoreAction::Logout, &account.user_id)
            .await
        {
            Ok(Some(_)) => Err(already_logged_in()),
            Ok(None) => {
                warn!(
                    "Clearing stale login flag for {}: session marker already expired",
                    account.user_id
                );
                account.is_logged_in = false;
                Ok(())
            }
            Err(e) => {
                warn!("Cannot check session marker for {}: {}", account.user_id, e);
                Err(already_logged_in())
            }
        }
    }

    /// End the session the access token belongs to
    pub async fn logout(&self, claims: &Claims, access_token: &str) -> ServiceResult<LogoutOutcome> {
        let principal = &claims.principal;

        let Some(mut account) = self.accounts.find_by_user_id(&principal.user_id).await? else {
            return Ok(LogoutOutcome::UserNotFound);
        };

        account.is_logged_in = false;
        let account = self
            .accounts
            .update(&account)
            .await
            .map_err(|e| ServiceError::Internal(format!("Logout: {}", e)))?;

        if !principal.is_sentinel() {
            self.blacklist(claims, access_token).await;
        }

        self.clear_session(&principal.user_id).await;

        if principal.is_sentinel() {
            info!("Forced logout of {}", principal.user_id);
        } else {
            info!("User {} logged out", principal.user_id);
        }
        Ok(LogoutOutcome::LoggedOut(account))
    }

    /// Exchange a matching refresh token for a fresh pair.
    ///
    /// `principal` comes from an expired access token and is trusted for
    /// identity only. A refresh token that differs from the last one issued
    /// locks the account and always fails with 403.
    pub async fn reissue_access_token(
        &self,
        principal: &Principal,
        refresh_token: &str,
        client_ip: Option<&str>,
    ) -> ServiceResult<ReissueOutcome> {
        let Some(stored) =
            get_record::<RefreshRecord>(self.store.as_ref(), StoreAction::Refresh, &principal.user_id)
                .await?
        else {
            return Ok(ReissueOutcome::NoRefreshToken);
        };

        if stored.refresh_token != refresh_token {
            return Err(self.respond_to_theft(&principal.user_id, client_ip).await);
        }

        let tokens = self.codec.issue_pair(principal)?;
        self.store_session(&principal.user_id, &tokens.refresh_token).await?;

        debug!("Reissued tokens for {}", principal.user_id);
        Ok(ReissueOutcome::Reissued(tokens))
    }

    async fn respond_to_theft(&self, user_id: &str, client_ip: Option<&str>) -> ServiceError {
        warn!(
            "Refresh token mismatch for {} from {}",
            user_id,
            client_ip.unwrap_or("unknown")
        );

        let account = match self.accounts.find_by_user_id(user_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return ServiceError::Authorization(ABNORMAL_ACCESS.to_string()),
            Err(e) => {
                error!("Account lookup failed during theft response for {}: {}", user_id, e);
                return ServiceError::Authorization(ABNORMAL_ACCESS.to_string());
            }
        };

        match self.notifier.notify(&account, client_ip).await {
            Ok(code) => {
                let locked = Account {
                    is_logged_in: false,
                    is_active: false,
                    verification_code: Some(code),
                    ..account
                };
                match self.accounts.update(&locked).await {
                    Ok(_) => warn!("Locked account {} after refresh token mismatch", user_id),
                    Err(e) => error!("Failed to lock account {}: {}", user_id, e),
                }
            }
            Err(e) => error!("Abnormal access notification for {} failed: {}", user_id, e),
        }

        self.clear_session(user_id).await;
        ServiceError::Authorization(ABNORMAL_ACCESS.to_string())
    }

    /// Re-activate a locked account with its password and emailed code
    pub async fn verify_account(
        &self,
        user_id: &str,
        password: &str,
        code: &str,
    ) -> ServiceResult<Account> {
        let mut account = self
            .accounts
            .find_by_user_id_with_password(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

        if !verify_password(password, &account.password_hash)? {
            return Err(ServiceError::Validation("Password does not match".to_string()));
        }

        if account.verification_code.as_deref() != Some(code) {
            return Err(ServiceError::Validation(
                "Invalid verification code, please check the link".to_string(),
            ));
        }

        account.is_active = true;
        account.verification_code = None;
        account.failed_login_attempts = 0;
        let mut account = self.accounts.update(&account).await?;
        account.password_hash.clear();

        info!("Re-activated account {}", user_id);
        Ok(account)
    }

    /// Remove an account and any session records it still has
    pub async fn delete_user(&self, user_id: &str) -> ServiceResult<()> {
        if !self.accounts.delete(user_id).await? {
            return Err(ServiceError::NotFound(
                "User to delete does not exist".to_string(),
            ));
        }

        self.clear_session(user_id).await;
        info!("Deleted account {}", user_id);
        Ok(())
    }

    /// Blacklist entry for an access token, if it was revoked
    pub async fn blacklist_entry(&self, access_token: &str) -> ServiceResult<Option<BlacklistEntry>> {
        get_record(self.store.as_ref(), StoreAction::Blacklist, access_token).await
    }

    /// Write the logout marker, then the refresh record.
    ///
    /// The refresh record goes last so a failed write leaves the previously
    /// issued refresh token valid for a retry.
    async fn store_session(&self, user_id: &str, refresh_token: &str) -> ServiceResult<()> {
        let ttl = self.codec.refresh_ttl();
        let marker = LogoutMarker {
            issued_at: Utc::now().timestamp(),
        };
        put_record(self.store.as_ref(), StoreAction::Logout, user_id, &marker, ttl).await?;

        let record = RefreshRecord {
            refresh_token: refresh_token.to_string(),
        };
        put_record(self.store.as_ref(), StoreAction::Refresh, user_id, &record, ttl).await
    }

    async fn blacklist(&self, claims: &Claims, access_token: &str) {
        let ttl = claims.remaining_secs();
        if ttl == 0 {
            return;
        }

        let entry = BlacklistEntry {
            reason: BLACKLIST_REASON.to_string(),
            principal: claims.principal.clone(),
        };
        if let Err(e) =
            put_record(self.store.as_ref(), StoreAction::Blacklist, access_token, &entry, ttl).await
        {
            warn!("Failed to blacklist token of {}: {}", claims.principal.user_id, e);
        }
    }

    async fn clear_session(&self, user_id: &str) {
        for action in [StoreAction::Refresh, StoreAction::Logout] {
            if let Err(e) = self.store.delete(action, user_id).await {
                warn!("Failed to delete {} record for {}: {}", action, user_id, e);
            }
        }
    }
}

fn principal_of(account: &Account) -> Principal {
    Principal {
        id: account.id,
        user_id: account.user_id.clone(),
        name: account.name.clone(),
    }
}

//! Authentication service
//!
//! Registration, password login and session lookups for Craft Studio accounts.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::ledger::LedgerEngine;
use crate::models::{
    Account, AuthTokensResponse, LoginRequest, NewAccount, RegisterRequest, Role, SessionAccount,
};
use crate::session::SessionCache;
use crate::store::{AccountStore, StoreError};

use super::jwt::{generate_access_token, JwtError};
use super::password::{hash_password, verify_password, CredentialCheck, PasswordError};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AuthError::UserNotFound,
            StoreError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::StoreError(other.to_string()),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::TokenError(e.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        AuthError::HashingFailed(e.to_string())
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    ledger: LedgerEngine,
    sessions: SessionCache,
    jwt_secret: String,
    access_token_ttl_seconds: i64,
    bcrypt_cost: u32,
    admin_emails: Vec<String>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        ledger: LedgerEngine,
        sessions: SessionCache,
        config: &Config,
    ) -> Self {
        Self {
            accounts,
            ledger,
            sessions,
            jwt_secret: config.jwt_secret.clone(),
            access_token_ttl_seconds: config.jwt_access_token_ttl_seconds,
            bcrypt_cost: config.bcrypt_cost,
            admin_emails: config.admin_emails.clone(),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    fn role_for(&self, email: &str) -> Role {
        if self.admin_emails.iter().any(|e| e == email) {
            Role::Admin
        } else {
            Role::User
        }
    }

    fn issue_tokens(&self, account: &Account) -> Result<AuthTokensResponse, AuthError> {
        let jti = Uuid::new_v4().to_string();
        let access_token =
            generate_access_token(account, &jti, &self.jwt_secret, self.access_token_ttl_seconds)?;

        Ok(AuthTokensResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl_seconds,
            user: account.into(),
        })
    }

    /// Create an account and sign it in
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthTokensResponse, AuthError> {
        if self.accounts.get_by_email(&req.email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let credential = hash_password(&req.password, self.bcrypt_cost)?;
        let role = self.role_for(&req.email);

        // The unique index still guards against a concurrent registration
        let account = self
            .accounts
            .create(NewAccount {
                avatar: Some(format!(
                    "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
                    req.name
                )),
                email: req.email,
                name: req.name,
                credential,
                role,
            })
            .await?;

        tracing::info!(user_id = %account.id, role = account.role.as_str(), "Account registered");

        self.sessions.refresh(&account).await;
        self.issue_tokens(&account)
    }

    /// Check a password and sign in. Legacy plain-text credentials are
    /// replaced with a bcrypt hash on success.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthTokensResponse, AuthError> {
        let account = self
            .accounts
            .get_by_email(&req.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let account = match verify_password(&req.password, &account.credential)? {
            CredentialCheck::Invalid => {
                tracing::warn!(user_id = %account.id, "Failed login attempt");
                return Err(AuthError::InvalidCredentials);
            }
            CredentialCheck::Valid => account,
            CredentialCheck::ValidLegacy => self.upgrade_credential(account, &req.password).await,
        };

        self.sessions.refresh(&account).await;
        self.issue_tokens(&account)
    }

    /// Best effort: a failed upgrade leaves the legacy credential in place
    async fn upgrade_credential(&self, account: Account, password: &str) -> Account {
        let hashed = match hash_password(password, self.bcrypt_cost) {
            Ok(hashed) => hashed,
            Err(e) => {
                tracing::warn!(user_id = %account.id, error = %e, "Could not hash legacy credential");
                return account;
            }
        };

        match self
            .ledger
            .replace_credential(account.id, &account.credential, hashed)
            .await
        {
            Ok(true) => {
                tracing::info!(user_id = %account.id, "Upgraded legacy credential");
                self.ledger.account(account.id).await.unwrap_or(account)
            }
            Ok(false) => account,
            Err(e) => {
                tracing::warn!(user_id = %account.id, error = %e, "Could not store upgraded credential");
                account
            }
        }
    }

    /// Cached session for an account, rebuilt from the store when missing
    pub async fn current_session(&self, user_id: Uuid) -> Result<SessionAccount, AuthError> {
        if let Some(session) = self.sessions.load(user_id).await {
            return Ok(session);
        }

        let account = self.accounts.get_by_id(user_id).await?;
        self.sessions.refresh(&account).await;
        Ok(SessionAccount::from(account))
    }

    pub async fn logout(&self, user_id: Uuid) {
        self.sessions.clear(user_id).await;
        tracing::info!(user_id = %user_id, "Signed out");
    }
}

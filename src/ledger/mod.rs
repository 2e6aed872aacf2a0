//! Ledger engine
//!
//! Every money, entitlement and quota change to an account goes through
//! [`LedgerEngine`]. Each operation reads the current account, validates it,
//! derives a patch with the pure functions in [`rules`], and writes the patch
//! with a version check. When another writer wins the race the operation is
//! re-derived from a fresh read, up to `max_attempts` times.

mod error;
pub mod rules;

pub use error::LedgerError;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::models::{
    Account, AdminStats, PaymentRequest, PaymentStatus, Plan, Product, QuotaStatus,
};
use crate::session::SessionCache;
use crate::store::{AccountPatch, AccountStore, NewPaymentRequest, PaymentRequestStore, StoreError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct LedgerEngine {
    accounts: Arc<dyn AccountStore>,
    payment_requests: Arc<dyn PaymentRequestStore>,
    sessions: SessionCache,
    max_attempts: u32,
    bcrypt_cost: u32,
}

impl LedgerEngine {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        payment_requests: Arc<dyn PaymentRequestStore>,
        sessions: SessionCache,
        max_attempts: u32,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            accounts,
            payment_requests,
            sessions,
            max_attempts: max_attempts.max(1),
            bcrypt_cost,
        }
    }

    /// Read, derive, compare-and-swap; repeated on version conflicts.
    ///
    /// An empty patch is not written and returns the account as read.
    async fn mutate<F>(
        &self,
        user_id: Uuid,
        operation: &'static str,
        mut derive: F,
    ) -> Result<Account, LedgerError>
    where
        F: FnMut(&Account) -> Result<AccountPatch, LedgerError> + Send,
    {
        for attempt in 1..=self.max_attempts {
            let current = self.accounts.get_by_id(user_id).await?;

            let patch = match derive(&current) {
                Ok(patch) => patch,
                Err(e) => {
                    if e.is_rejection() {
                        tracing::warn!(user_id = %user_id, operation, reason = %e, "Ledger operation rejected");
                    }
                    return Err(e);
                }
            };

            if patch.is_empty() {
                return Ok(current);
            }

            match self.accounts.update(user_id, current.version, patch).await {
                Ok(next) => {
                    self.sessions.refresh(&next).await;
                    return Ok(next);
                }
                Err(StoreError::VersionConflict) => {
                    tracing::debug!(
                        user_id = %user_id,
                        operation,
                        attempt,
                        "Account changed during update, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            user_id = %user_id,
            operation,
            attempts = self.max_attempts,
            "Giving up after repeated version conflicts"
        );
        Err(LedgerError::Conflict(format!(
            "{} did not complete after {} attempts",
            operation, self.max_attempts
        )))
    }

    pub async fn account(&self, user_id: Uuid) -> Result<Account, LedgerError> {
        Ok(self.accounts.get_by_id(user_id).await?)
    }

    pub async fn purchase(&self, user_id: Uuid, product: &Product) -> Result<Account, LedgerError> {
        let account = self
            .mutate(user_id, "purchase", |current| {
                rules::purchase(current, product, Utc::now())
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            product_id = %product.id,
            charged = account.transactions.first().map(|t| t.amount).unwrap_or(0),
            balance = account.balance,
            "Product purchased"
        );
        Ok(account)
    }

    pub async fn subscribe(
        &self,
        user_id: Uuid,
        plan: Plan,
        price: i64,
    ) -> Result<Account, LedgerError> {
        let account = self
            .mutate(user_id, "subscribe", |current| {
                rules::subscribe(current, plan, price, Utc::now())
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            plan = %plan,
            price,
            expires_at = ?account.subscription.expires_at,
            "Subscription updated"
        );
        Ok(account)
    }

    pub async fn top_up(&self, user_id: Uuid, amount: i64) -> Result<Account, LedgerError> {
        let account = self
            .mutate(user_id, "top_up", |current| {
                rules::top_up(current, amount, Utc::now())
            })
            .await?;

        tracing::info!(user_id = %user_id, amount, balance = account.balance, "Balance topped up");
        Ok(account)
    }

    /// Count one AI call against the quota, failing if the window is used up
    pub async fn consume_quota(&self, user_id: Uuid) -> Result<QuotaStatus, LedgerError> {
        let account = self
            .mutate(user_id, "consume_quota", |current| {
                rules::consume_quota(current, Utc::now())
            })
            .await?;

        Ok(rules::quota_status(&account, Utc::now()))
    }

    /// Check the quota now and record the call in the background.
    ///
    /// Refusal is immediate. The write itself is best effort: a failure is
    /// logged and does not affect the caller.
    pub async fn spawn_quota_consumption(&self, user_id: Uuid) -> Result<QuotaStatus, LedgerError> {
        let account = self.accounts.get_by_id(user_id).await?;
        let now = Utc::now();
        if let Err(e) = rules::consume_quota(&account, now) {
            tracing::warn!(user_id = %user_id, reason = %e, "AI call refused");
            return Err(e);
        }

        let mut projected = rules::quota_status(&account, now);
        projected.used = projected.used.saturating_add(1);

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.consume_quota(user_id).await {
                tracing::error!(user_id = %user_id, error = %e, "Background quota update failed");
            }
        });

        Ok(projected)
    }

    pub async fn quota_status(&self, user_id: Uuid) -> Result<QuotaStatus, LedgerError> {
        let account = self.accounts.get_by_id(user_id).await?;
        Ok(rules::quota_status(&account, Utc::now()))
    }

    pub async fn record_token_usage(&self, user_id: Uuid, tokens: i64) -> Result<Account, LedgerError> {
        if tokens <= 0 {
            return Err(LedgerError::InvalidAmount(tokens));
        }
        self.mutate(user_id, "record_token_usage", |current| {
            rules::record_tokens(current, tokens)
        })
        .await
    }

    pub async fn record_chats_count(&self, user_id: Uuid, count: i64) -> Result<Account, LedgerError> {
        if count < 0 {
            return Err(LedgerError::InvalidAmount(count));
        }
        self.mutate(user_id, "record_chats_count", |current| {
            Ok(rules::record_chats(current, count))
        })
        .await
    }

    pub fn spawn_token_usage(&self, user_id: Uuid, tokens: i64) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.record_token_usage(user_id, tokens).await {
                tracing::error!(user_id = %user_id, tokens, error = %e, "Failed to record token usage");
            }
        });
    }

    pub fn spawn_chats_count(&self, user_id: Uuid, count: i64) {
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.record_chats_count(user_id, count).await {
                tracing::error!(user_id = %user_id, count, error = %e, "Failed to record chat count");
            }
        });
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), LedgerError> {
        let new_hash = hash_password(new_password, self.bcrypt_cost)
            .map_err(|e| LedgerError::Transient(e.to_string()))?;

        self.mutate(user_id, "change_password", |account| {
            let check = verify_password(current_password, &account.credential)
                .map_err(|e| LedgerError::Transient(e.to_string()))?;
            if !check.is_valid() {
                return Err(LedgerError::InvalidCredential);
            }
            Ok(AccountPatch {
                credential: Some(new_hash.clone()),
                ..Default::default()
            })
        })
        .await?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Swap a credential for `new_credential` only if it still equals `expected`.
    /// Returns false when the credential had already changed.
    pub async fn replace_credential(
        &self,
        user_id: Uuid,
        expected: &str,
        new_credential: String,
    ) -> Result<bool, LedgerError> {
        let mut replaced = false;
        self.mutate(user_id, "replace_credential", |account| {
            replaced = account.credential == expected;
            Ok(AccountPatch {
                credential: replaced.then(|| new_credential.clone()),
                ..Default::default()
            })
        })
        .await?;

        Ok(replaced)
    }

    pub async fn create_payment_request(
        &self,
        user_id: Uuid,
        amount: i64,
        screenshot: String,
    ) -> Result<PaymentRequest, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        self.accounts.get_by_id(user_id).await?;

        let request = self
            .payment_requests
            .create(NewPaymentRequest {
                user_id,
                amount,
                screenshot,
            })
            .await?;

        tracing::info!(user_id = %user_id, request_id = %request.id, amount, "Payment request created");
        Ok(request)
    }

    pub async fn list_payment_requests(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, LedgerError> {
        Ok(self.payment_requests.list(status).await?)
    }

    pub async fn list_user_payment_requests(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PaymentRequest>, LedgerError> {
        Ok(self.payment_requests.list_for_user(user_id).await?)
    }

    async fn resolve_payment_request(
        &self,
        request_id: Uuid,
        status: PaymentStatus,
        admin_id: Uuid,
    ) -> Result<PaymentRequest, LedgerError> {
        match self
            .payment_requests
            .resolve(request_id, status, admin_id)
            .await
        {
            Ok(Some(request)) => Ok(request),
            Ok(None) => {
                tracing::warn!(request_id = %request_id, "Payment request already processed");
                Err(LedgerError::AlreadyProcessed)
            }
            Err(StoreError::NotFound) => Err(LedgerError::NotFound("Payment request")),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a pending request approved, then credit the requester.
    ///
    /// The status transition is committed first so a request can never be
    /// credited twice. If the credit then fails the request stays approved
    /// and the error is returned for an operator to resolve.
    pub async fn approve_payment_request(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
    ) -> Result<PaymentRequest, LedgerError> {
        let request = self
            .resolve_payment_request(request_id, PaymentStatus::Approved, admin_id)
            .await?;

        if let Err(e) = self.top_up(request.user_id, request.amount).await {
            tracing::error!(
                request_id = %request.id,
                user_id = %request.user_id,
                amount = request.amount,
                error = %e,
                "Payment request approved but top-up failed"
            );
            return Err(e);
        }

        tracing::info!(request_id = %request.id, admin_id = %admin_id, "Payment request approved");
        Ok(request)
    }

    pub async fn reject_payment_request(
        &self,
        request_id: Uuid,
        admin_id: Uuid,
    ) -> Result<PaymentRequest, LedgerError> {
        let request = self
            .resolve_payment_request(request_id, PaymentStatus::Rejected, admin_id)
            .await?;

        tracing::info!(request_id = %request.id, admin_id = %admin_id, "Payment request rejected");
        Ok(request)
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, LedgerError> {
        Ok(self.accounts.admin_stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAccount, Role};
    use crate::store::MemoryAccountStore;
    use crate::store::MemoryPaymentRequestStore;

    async fn engine_with_account(balance: i64) -> (LedgerEngine, Uuid) {
        let accounts = Arc::new(MemoryAccountStore::new());
        let account = accounts
            .create(NewAccount {
                email: "unit@craft.studio".to_string(),
                name: "Unit".to_string(),
                credential: hash_password("old-password", 4).unwrap(),
                avatar: None,
                role: Role::User,
            })
            .await
            .unwrap();

        let engine = LedgerEngine::new(
            accounts,
            Arc::new(MemoryPaymentRequestStore::new()),
            SessionCache::in_memory(),
            DEFAULT_MAX_ATTEMPTS,
            4,
        );
        if balance > 0 {
            engine.top_up(account.id, balance).await.unwrap();
        }
        (engine, account.id)
    }

    #[tokio::test]
    async fn test_rejection_leaves_version_untouched() {
        let (engine, id) = engine_with_account(0).await;
        let before = engine.account(id).await.unwrap();

        let err = engine.subscribe(id, Plan::Premium, 350).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(engine.account(id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (engine, id) = engine_with_account(0).await;

        let err = engine
            .change_password(id, "wrong", "new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCredential));

        engine
            .change_password(id, "old-password", "new-password")
            .await
            .unwrap();
        let account = engine.account(id).await.unwrap();
        assert!(verify_password("new-password", &account.credential)
            .unwrap()
            .is_valid());
        assert!(account.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_replace_credential_is_conditional() {
        let (engine, id) = engine_with_account(0).await;
        let account = engine.account(id).await.unwrap();

        assert!(!engine
            .replace_credential(id, "not-current", "x".to_string())
            .await
            .unwrap());
        assert_eq!(engine.account(id).await.unwrap().version, account.version);

        assert!(engine
            .replace_credential(id, &account.credential, "x".to_string())
            .await
            .unwrap());
        assert_eq!(engine.account(id).await.unwrap().credential, "x");
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (engine, _) = engine_with_account(0).await;
        let err = engine.top_up(Uuid::new_v4(), 10).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound("Account")));
    }

    #[tokio::test]
    async fn test_payment_request_requires_positive_amount() {
        let (engine, id) = engine_with_account(0).await;
        let err = engine
            .create_payment_request(id, 0, "proof.png".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(0)));
    }
}

//! Authentication models for Craft Studio

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Account, Quota, Role, Stats, Subscription, TransactionRecord};

/// Account as handed to clients and kept in the session cache.
///
/// Never carries the credential. Every field defaults when absent so that
/// cached payloads written by older releases still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAccount {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub quota: Quota,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub subscription: Subscription,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Account> for SessionAccount {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.name.clone(),
            avatar: account.avatar.clone(),
            role: account.role,
            balance: account.balance,
            quota: account.quota,
            inventory: account.inventory.clone(),
            subscription: account.subscription,
            stats: account.stats,
            transactions: account.transactions.clone(),
            created_at: Some(account.created_at),
        }
    }
}

impl From<Account> for SessionAccount {
    fn from(account: Account) -> Self {
        SessionAccount::from(&account)
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 2, max = 255))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 6, max = 128))]
    pub new_password: String,
}

/// Auth tokens response
#[derive(Debug, Serialize)]
pub struct AuthTokensResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SessionAccount,
}

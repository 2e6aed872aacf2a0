//! Persistence for accounts, payment requests and the product catalog
//!
//! Every store is a trait so the ledger can run against Postgres in
//! production and against process-local maps in tests and local runs.
//!
//! Account writes are compare-and-swap: `update` carries the version the
//! caller read, applies the patch in a single statement, and fails with
//! [`StoreError::VersionConflict`] if another writer got there first.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    default_products, Account, AdminStats, NewAccount, NewProduct, PaymentRequest, PaymentStatus,
    Product, ProductPatch, Quota, Role, Stats, Subscription, TransactionRecord,
};

mod memory;
mod postgres;

pub use memory::{MemoryAccountStore, MemoryPaymentRequestStore, MemoryProductCatalog};
pub use postgres::{PgAccountStore, PgPaymentRequestStore, PgProductCatalog};

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Record was modified by another writer")]
    VersionConflict,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Fields to overwrite on an account. `None` keeps the stored value; JSON
/// sub-documents that are present replace the stored document wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub credential: Option<String>,
    pub avatar: Option<String>,
    pub role: Option<Role>,
    pub balance: Option<i64>,
    pub quota: Option<Quota>,
    pub inventory: Option<Vec<String>>,
    pub subscription: Option<Subscription>,
    pub stats: Option<Stats>,
    pub transactions: Option<Vec<TransactionRecord>>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        *self == AccountPatch::default()
    }

    /// Merge into an in-memory account. Does not touch `version`.
    pub fn apply(self, account: &mut Account) {
        if let Some(name) = self.name {
            account.name = name;
        }
        if let Some(credential) = self.credential {
            account.credential = credential;
        }
        if let Some(avatar) = self.avatar {
            account.avatar = Some(avatar);
        }
        if let Some(role) = self.role {
            account.role = role;
        }
        if let Some(balance) = self.balance {
            account.balance = balance;
        }
        if let Some(quota) = self.quota {
            account.quota = quota;
        }
        if let Some(inventory) = self.inventory {
            account.inventory = inventory;
        }
        if let Some(subscription) = self.subscription {
            account.subscription = subscription;
        }
        if let Some(stats) = self.stats {
            account.stats = stats;
        }
        if let Some(transactions) = self.transactions {
            account.transactions = transactions;
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Account, StoreError>;

    /// `Ok(None)` when no account uses this email
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Fails with `Conflict` if the email is taken
    async fn create(&self, draft: NewAccount) -> Result<Account, StoreError>;

    /// Apply `patch` only if the stored version still equals `expected_version`.
    /// Returns the new row with its version incremented.
    async fn update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: AccountPatch,
    ) -> Result<Account, StoreError>;

    async fn admin_stats(&self) -> Result<AdminStats, StoreError>;

    /// Connectivity probe for health checks
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct NewPaymentRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub screenshot: String,
}

#[async_trait]
pub trait PaymentRequestStore: Send + Sync {
    async fn create(&self, draft: NewPaymentRequest) -> Result<PaymentRequest, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRequest>, StoreError>;

    /// Newest first, optionally filtered by status
    async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<PaymentRequest>, StoreError>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PaymentRequest>, StoreError>;

    /// Move a pending request to `status`. `Ok(None)` means the request
    /// exists but is no longer pending.
    async fn resolve(
        &self,
        id: Uuid,
        status: PaymentStatus,
        reviewed_by: Uuid,
    ) -> Result<Option<PaymentRequest>, StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Newest first
    async fn list(&self) -> Result<Vec<Product>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn create(&self, draft: NewProduct) -> Result<Product, StoreError>;

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;
}

/// Insert the default catalog if the catalog is empty. Returns how many items were added.
pub async fn seed_default_products(catalog: &dyn ProductCatalog) -> Result<usize, StoreError> {
    if catalog.count().await? > 0 {
        return Ok(0);
    }

    let defaults = default_products();
    let total = defaults.len();
    for product in defaults {
        catalog.create(product).await?;
    }

    tracing::info!(count = total, "Seeded default product catalog");
    Ok(total)
}

/// The three stores, behind trait objects
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub payment_requests: Arc<dyn PaymentRequestStore>,
    pub products: Arc<dyn ProductCatalog>,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(PgAccountStore::new(pool.clone())),
            payment_requests: Arc::new(PgPaymentRequestStore::new(pool.clone())),
            products: Arc::new(PgProductCatalog::new(pool)),
        }
    }

    pub fn memory() -> Self {
        Self {
            accounts: Arc::new(MemoryAccountStore::new()),
            payment_requests: Arc::new(MemoryPaymentRequestStore::new()),
            products: Arc::new(MemoryProductCatalog::new()),
        }
    }
}

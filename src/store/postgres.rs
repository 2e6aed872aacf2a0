//! Postgres-backed stores
//!
//! JSON sub-documents of an account live in JSONB columns and are decoded
//! into typed records at this boundary. Missing documents (rows written by
//! older releases) fall back to their defaults.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AccountPatch, AccountStore, NewPaymentRequest, PaymentRequestStore, ProductCatalog, StoreError,
};
use crate::models::{
    Account, AccessLevel, AdminStats, NewAccount, NewProduct, PaymentRequest, PaymentStatus,
    Product, ProductPatch, Quota, Role, Stats, Subscription, TransactionRecord,
};

const ACCOUNT_COLUMNS: &str = "id, email, name, password, avatar, role, balance, quota, \
     inventory, subscription, stats, transactions, version, created_at";

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    name: String,
    password: String,
    avatar: Option<String>,
    role: Option<String>,
    balance: Option<i64>,
    quota: Option<Json<Quota>>,
    inventory: Option<Json<Vec<String>>>,
    subscription: Option<Json<Subscription>>,
    stats: Option<Json<Stats>>,
    transactions: Option<Json<Vec<TransactionRecord>>>,
    version: i64,
    created_at: Option<DateTime<Utc>>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: row.id,
            email: row.email,
            name: row.name,
            credential: row.password,
            avatar: row.avatar,
            role: row.role.as_deref().map(Role::from_stored).unwrap_or_default(),
            balance: row.balance.unwrap_or(0),
            quota: row.quota.map(|j| j.0).unwrap_or_default(),
            inventory: row.inventory.map(|j| j.0).unwrap_or_default(),
            subscription: row.subscription.map(|j| j.0).unwrap_or_default(),
            stats: row.stats.map(|j| j.0).unwrap_or_default(),
            transactions: row.transactions.map(|j| j.0).unwrap_or_default(),
            version: row.version,
            created_at: row.created_at.unwrap_or_default(),
        }
    }
}

/// Account store over the `users` table
#[derive(Clone)]
pub struct PgAccountStore {
    db_pool: PgPool,
}

impl PgAccountStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        let row: AccountRow =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", ACCOUNT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {} FROM users WHERE email = $1", ACCOUNT_COLUMNS))
                .bind(email)
                .fetch_optional(&self.db_pool)
                .await?;

        Ok(row.map(Account::from))
    }

    async fn create(&self, draft: NewAccount) -> Result<Account, StoreError> {
        let now = Utc::now();

        let row: AccountRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (id, email, name, password, avatar, role, balance, quota,
                               inventory, subscription, stats, transactions, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, '[]'::jsonb, $8, $9, '[]'::jsonb, 0, $10)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&draft.email)
        .bind(&draft.name)
        .bind(&draft.credential)
        .bind(&draft.avatar)
        .bind(draft.role.as_str())
        .bind(Json(Quota {
            used: 0,
            last_reset: now,
        }))
        .bind(Json(Subscription::default()))
        .bind(Json(Stats::default()))
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(row.into())
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: AccountPatch,
    ) -> Result<Account, StoreError> {
        // One statement: the merge and the version check cannot be split by another writer
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($3, name),
                password = COALESCE($4, password),
                avatar = COALESCE($5, avatar),
                role = COALESCE($6, role),
                balance = COALESCE($7, balance),
                quota = COALESCE($8, quota),
                inventory = COALESCE($9, inventory),
                subscription = COALESCE($10, subscription),
                stats = COALESCE($11, stats),
                transactions = COALESCE($12, transactions),
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(expected_version)
        .bind(patch.name)
        .bind(patch.credential)
        .bind(patch.avatar)
        .bind(patch.role.map(|r| r.as_str()))
        .bind(patch.balance)
        .bind(patch.quota.map(Json))
        .bind(patch.inventory.map(Json))
        .bind(patch.subscription.map(Json))
        .bind(patch.stats.map(Json))
        .bind(patch.transactions.map(Json))
        .fetch_optional(&self.db_pool)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db_pool)
            .await?;

        if exists {
            Err(StoreError::VersionConflict)
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn admin_stats(&self) -> Result<AdminStats, StoreError> {
        let (total_users, active_subs, total_revenue): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (
                    WHERE lower(COALESCE(subscription->>'plan', 'free'))
                          IN ('standard', 'premium', 'pro', 'enterprise')
                ),
                COALESCE(SUM(COALESCE((stats->>'totalSpent')::bigint, 0)), 0)::bigint
            FROM users
            "#,
        )
        .fetch_one(&self.db_pool)
        .await?;

        Ok(AdminStats {
            total_users,
            active_subs,
            total_revenue,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await?;
        Ok(())
    }
}

const PAYMENT_COLUMNS: &str =
    "id, user_id, amount, screenshot, status, created_at, reviewed_at, reviewed_by";

#[derive(Debug, sqlx::FromRow)]
struct PaymentRequestRow {
    id: Uuid,
    user_id: Uuid,
    amount: i64,
    screenshot: String,
    status: String,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
}

impl TryFrom<PaymentRequestRow> for PaymentRequest {
    type Error = StoreError;

    fn try_from(row: PaymentRequestRow) -> Result<Self, Self::Error> {
        let status = PaymentStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Database(format!("unknown payment request status '{}'", row.status))
        })?;

        Ok(PaymentRequest {
            id: row.id,
            user_id: row.user_id,
            amount: row.amount,
            screenshot: row.screenshot,
            status,
            created_at: row.created_at,
            reviewed_at: row.reviewed_at,
            reviewed_by: row.reviewed_by,
        })
    }
}

fn into_requests(rows: Vec<PaymentRequestRow>) -> Result<Vec<PaymentRequest>, StoreError> {
    rows.into_iter().map(PaymentRequest::try_from).collect()
}

/// Top-up requests over the `payment_requests` table
#[derive(Clone)]
pub struct PgPaymentRequestStore {
    db_pool: PgPool,
}

impl PgPaymentRequestStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRequestStore for PgPaymentRequestStore {
    async fn create(&self, draft: NewPaymentRequest) -> Result<PaymentRequest, StoreError> {
        let row: PaymentRequestRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO payment_requests (id, user_id, amount, screenshot, status, created_at)
            VALUES ($1, $2, $3, $4, 'pending', NOW())
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(draft.user_id)
        .bind(draft.amount)
        .bind(&draft.screenshot)
        .fetch_one(&self.db_pool)
        .await?;

        row.try_into()
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRequest>, StoreError> {
        let row: Option<PaymentRequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_requests WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(PaymentRequest::try_from).transpose()
    }

    async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<PaymentRequest>, StoreError> {
        let rows: Vec<PaymentRequestRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM payment_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db_pool)
        .await?;

        into_requests(rows)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PaymentRequest>, StoreError> {
        let rows: Vec<PaymentRequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_requests WHERE user_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        into_requests(rows)
    }

    async fn resolve(
        &self,
        id: Uuid,
        status: PaymentStatus,
        reviewed_by: Uuid,
    ) -> Result<Option<PaymentRequest>, StoreError> {
        // Conditional on 'pending' so two reviewers cannot both win
        let row: Option<PaymentRequestRow> = sqlx::query_as(&format!(
            r#"
            UPDATE payment_requests
            SET status = $2, reviewed_at = NOW(), reviewed_by = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(reviewed_by)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_into()?)),
            None => match self.get(id).await? {
                Some(_) => Ok(None),
                None => Err(StoreError::NotFound),
            },
        }
    }
}

const PRODUCT_COLUMNS: &str =
    "id, title, category, price, image, description, purchased_content, access_level, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    title: String,
    category: String,
    price: i64,
    image: Option<String>,
    description: Option<String>,
    purchased_content: Option<String>,
    access_level: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            title: row.title,
            category: row.category,
            price: row.price,
            image: row.image,
            description: row.description,
            purchased_content: row.purchased_content,
            access_level: AccessLevel::from_stored(row.access_level.as_deref()),
            created_at: row.created_at,
        }
    }
}

/// Catalog over the `products` table
#[derive(Clone)]
pub struct PgProductCatalog {
    db_pool: PgPool,
}

impl PgProductCatalog {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products ORDER BY created_at DESC",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn create(&self, draft: NewProduct) -> Result<Product, StoreError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO products (id, title, category, price, image, description,
                                  purchased_content, access_level, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&draft.title)
        .bind(&draft.category)
        .bind(draft.price)
        .bind(&draft.image)
        .bind(&draft.description)
        .bind(&draft.purchased_content)
        .bind(draft.access_level.as_str())
        .fetch_one(&self.db_pool)
        .await?;

        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product, StoreError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r#"
            UPDATE products
            SET title = COALESCE($2, title),
                category = COALESCE($3, category),
                price = COALESCE($4, price),
                image = COALESCE($5, image),
                description = COALESCE($6, description),
                purchased_content = COALESCE($7, purchased_content),
                access_level = COALESCE($8, access_level)
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(patch.title)
        .bind(patch.category)
        .bind(patch.price)
        .bind(patch.image)
        .bind(patch.description)
        .bind(patch.purchased_content)
        .bind(patch.access_level.map(|l| l.as_str()))
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let rows_affected = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.db_pool)
            .await?;

        Ok(count)
    }
}

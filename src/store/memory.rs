//! Process-local stores backed by `RwLock`ed maps

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AccountPatch, AccountStore, NewPaymentRequest, PaymentRequestStore, ProductCatalog, StoreError,
};
use crate::models::{
    Account, AdminStats, NewAccount, NewProduct, PaymentRequest, PaymentStatus, Plan, Product,
    ProductPatch, Quota, Stats, Subscription,
};

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed account, bypassing defaults. Used to load fixtures.
    pub async fn insert(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        self.accounts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn create(&self, draft: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;

        if accounts.values().any(|a| a.email == draft.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                draft.email
            )));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: draft.email,
            name: draft.name,
            credential: draft.credential,
            avatar: draft.avatar,
            role: draft.role,
            balance: 0,
            quota: Quota {
                used: 0,
                last_reset: now,
            },
            inventory: Vec::new(),
            subscription: Subscription::default(),
            stats: Stats::default(),
            transactions: Vec::new(),
            version: 0,
            created_at: now,
        };
        accounts.insert(account.id, account.clone());

        Ok(account)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: AccountPatch,
    ) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;

        if account.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        patch.apply(account);
        account.version += 1;

        Ok(account.clone())
    }

    async fn admin_stats(&self) -> Result<AdminStats, StoreError> {
        let accounts = self.accounts.read().await;

        Ok(AdminStats {
            total_users: accounts.len() as i64,
            active_subs: accounts
                .values()
                .filter(|a| a.subscription.plan != Plan::Free)
                .count() as i64,
            total_revenue: accounts.values().map(|a| a.stats.total_spent).sum(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPaymentRequestStore {
    requests: RwLock<HashMap<Uuid, PaymentRequest>>,
}

impl MemoryPaymentRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut requests: Vec<PaymentRequest>) -> Vec<PaymentRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    requests
}

#[async_trait]
impl PaymentRequestStore for MemoryPaymentRequestStore {
    async fn create(&self, draft: NewPaymentRequest) -> Result<PaymentRequest, StoreError> {
        let request = PaymentRequest {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            amount: draft.amount,
            screenshot: draft.screenshot,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
            reviewed_at: None,
            reviewed_by: None,
        };
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());

        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRequest>, StoreError> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn list(&self, status: Option<PaymentStatus>) -> Result<Vec<PaymentRequest>, StoreError> {
        let requests = self.requests.read().await;
        Ok(newest_first(
            requests
                .values()
                .filter(|r| status.map_or(true, |s| r.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PaymentRequest>, StoreError> {
        let requests = self.requests.read().await;
        Ok(newest_first(
            requests
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn resolve(
        &self,
        id: Uuid,
        status: PaymentStatus,
        reviewed_by: Uuid,
    ) -> Result<Option<PaymentRequest>, StoreError> {
        let mut requests = self.requests.write().await;
        let request = requests.get_mut(&id).ok_or(StoreError::NotFound)?;

        if request.status != PaymentStatus::Pending {
            return Ok(None);
        }

        request.status = status;
        request.reviewed_at = Some(Utc::now());
        request.reviewed_by = Some(reviewed_by);

        Ok(Some(request.clone()))
    }
}

#[derive(Default)]
pub struct MemoryProductCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
}

impl MemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductCatalog for MemoryProductCatalog {
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self.products.read().await.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn create(&self, draft: NewProduct) -> Result<Product, StoreError> {
        let product = Product {
            id: Uuid::new_v4(),
            title: draft.title,
            category: draft.category,
            price: draft.price,
            image: draft.image,
            description: draft.description,
            purchased_content: draft.purchased_content,
            access_level: draft.access_level,
            created_at: Utc::now(),
        };
        self.products
            .write()
            .await
            .insert(product.id, product.clone());

        Ok(product)
    }

    async fn update(&self, id: Uuid, patch: ProductPatch) -> Result<Product, StoreError> {
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or(StoreError::NotFound)?;
        patch.apply(product);
        Ok(product.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.products
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.products.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn draft(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            name: "Tester".to_string(),
            credential: "hash".to_string(),
            avatar: None,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let store = MemoryAccountStore::new();
        store.create(draft("dup@craft.studio")).await.unwrap();

        let err = store.create(draft("dup@craft.studio")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_is_compare_and_swap() {
        let store = MemoryAccountStore::new();
        let account = store.create(draft("cas@craft.studio")).await.unwrap();

        let patch = AccountPatch {
            balance: Some(10),
            ..Default::default()
        };
        let updated = store.update(account.id, 0, patch.clone()).await.unwrap();
        assert_eq!(updated.version, 1);

        // A writer that still holds version 0 loses
        let err = store.update(account.id, 0, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict));
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let store = MemoryAccountStore::new();
        let err = store
            .update(Uuid::new_v4(), 0, AccountPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_resolve_only_once() {
        let store = MemoryPaymentRequestStore::new();
        let admin = Uuid::new_v4();
        let request = store
            .create(NewPaymentRequest {
                user_id: Uuid::new_v4(),
                amount: 500,
                screenshot: "proof.png".to_string(),
            })
            .await
            .unwrap();

        let approved = store
            .resolve(request.id, PaymentStatus::Approved, admin)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, PaymentStatus::Approved);
        assert_eq!(approved.reviewed_by, Some(admin));

        let second = store
            .resolve(request.id, PaymentStatus::Rejected, admin)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = MemoryPaymentRequestStore::new();
        let user = Uuid::new_v4();
        for amount in [100, 200] {
            store
                .create(NewPaymentRequest {
                    user_id: user,
                    amount,
                    screenshot: "p".to_string(),
                })
                .await
                .unwrap();
        }
        let first = store.list(None).await.unwrap()[0].id;
        store
            .resolve(first, PaymentStatus::Rejected, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(store.list(Some(PaymentStatus::Pending)).await.unwrap().len(), 1);
        assert_eq!(store.list(Some(PaymentStatus::Rejected)).await.unwrap().len(), 1);
        assert_eq!(store.list_for_user(user).await.unwrap().len(), 2);
    }
}

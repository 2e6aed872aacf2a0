//! Ledger behaviour against the in-memory stores
//!
//! Covers the money and entitlement rules, the payment request workflow,
//! quota rollover and the compare-and-swap retry loop.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use craft_studio_server::ledger::{LedgerEngine, LedgerError, DEFAULT_MAX_ATTEMPTS};
use craft_studio_server::models::{
    AccessLevel, Account, AdminStats, NewAccount, PaymentStatus, Plan, Product, Quota, Role,
    Stats, Subscription,
};
use craft_studio_server::session::SessionCache;
use craft_studio_server::store::{
    AccountPatch, AccountStore, MemoryAccountStore, MemoryPaymentRequestStore, StoreError,
};

fn engine(accounts: Arc<dyn AccountStore>, sessions: SessionCache) -> LedgerEngine {
    LedgerEngine::new(
        accounts,
        Arc::new(MemoryPaymentRequestStore::new()),
        sessions,
        DEFAULT_MAX_ATTEMPTS,
        4,
    )
}

fn fixture(balance: i64, plan: Plan) -> Account {
    Account {
        id: Uuid::new_v4(),
        email: format!("{}@craft.studio", Uuid::new_v4().simple()),
        name: "Fixture".to_string(),
        credential: "unused".to_string(),
        avatar: None,
        role: Role::User,
        balance,
        quota: Quota {
            used: 0,
            last_reset: Utc::now(),
        },
        inventory: vec![],
        subscription: Subscription {
            plan,
            expires_at: None,
        },
        stats: Stats::default(),
        transactions: vec![],
        version: 0,
        created_at: Utc::now(),
    }
}

fn product(price: i64, access_level: AccessLevel) -> Product {
    Product {
        id: Uuid::new_v4(),
        title: "React Mastery Course".to_string(),
        category: "Course".to_string(),
        price,
        image: None,
        description: None,
        purchased_content: Some("link".to_string()),
        access_level,
        created_at: Utc::now(),
    }
}

async fn setup(account: Account) -> (LedgerEngine, Arc<MemoryAccountStore>, Uuid) {
    let store = Arc::new(MemoryAccountStore::new());
    let id = account.id;
    store.insert(account).await;
    (engine(store.clone(), SessionCache::in_memory()), store, id)
}

// ============================================================================
// Purchases
// ============================================================================

#[tokio::test]
async fn test_purchase_without_funds_changes_nothing() {
    let (ledger, store, id) = setup(fixture(100, Plan::Free)).await;
    let before = store.get_by_id(id).await.unwrap();

    let err = ledger
        .purchase(id, &product(300, AccessLevel::Free))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(store.get_by_id(id).await.unwrap(), before);
}

#[tokio::test]
async fn test_purchase_twice_is_already_owned() {
    let (ledger, store, id) = setup(fixture(1_000, Plan::Free)).await;
    let item = product(100, AccessLevel::Free);

    ledger.purchase(id, &item).await.unwrap();
    let after_first = store.get_by_id(id).await.unwrap();

    let err = ledger.purchase(id, &item).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyOwned));
    assert_eq!(store.get_by_id(id).await.unwrap(), after_first);
}

#[tokio::test]
async fn test_premium_purchase_charges_nothing() {
    let (ledger, _, id) = setup(fixture(0, Plan::Premium)).await;
    let item = product(1_190, AccessLevel::Premium);

    let account = ledger.purchase(id, &item).await.unwrap();

    assert_eq!(account.balance, 0);
    assert!(account.owns(&item.id.to_string()));
    assert_eq!(account.stats.total_spent, 0);
    assert_eq!(account.transactions[0].amount, 0);
}

#[tokio::test]
async fn test_premium_purchase_with_negative_balance() {
    let (ledger, _, id) = setup(fixture(-10, Plan::Premium)).await;
    let item = product(300, AccessLevel::Premium);

    let account = ledger.purchase(id, &item).await.unwrap();

    assert_eq!(account.balance, -10);
    assert!(account.owns(&item.id.to_string()));
    assert_eq!(
        account.transactions[0].title,
        "received free: React Mastery Course"
    );
}

#[tokio::test]
async fn test_standard_purchase_end_to_end() {
    let (ledger, _, id) = setup(fixture(1_000, Plan::Standard)).await;
    let item = product(400, AccessLevel::Standard);

    let account = ledger.purchase(id, &item).await.unwrap();

    assert_eq!(account.balance, 600);
    assert_eq!(account.inventory, vec![item.id.to_string()]);
    assert_eq!(account.stats.total_spent, 400);
    assert_eq!(
        account.transactions[0].title,
        "purchased: React Mastery Course"
    );
    assert_eq!(account.transactions[0].amount, 400);
}

#[tokio::test]
async fn test_access_matrix_is_enforced() {
    let cases = [
        (Plan::Free, AccessLevel::Free, true),
        (Plan::Free, AccessLevel::Standard, false),
        (Plan::Free, AccessLevel::Premium, false),
        (Plan::Standard, AccessLevel::Free, true),
        (Plan::Standard, AccessLevel::Standard, true),
        (Plan::Standard, AccessLevel::Premium, false),
        (Plan::Premium, AccessLevel::Free, true),
        (Plan::Premium, AccessLevel::Standard, true),
        (Plan::Premium, AccessLevel::Premium, true),
    ];

    for (plan, level, allowed) in cases {
        let (ledger, store, id) = setup(fixture(500, plan)).await;
        let result = ledger.purchase(id, &product(300, level)).await;

        if allowed {
            assert!(result.is_ok(), "{:?} should access {:?}", plan, level);
        } else {
            assert!(
                matches!(result, Err(LedgerError::AccessDenied { .. })),
                "{:?} should not access {:?}",
                plan,
                level
            );
            assert_eq!(store.get_by_id(id).await.unwrap().balance, 500);
        }
    }
}

// ============================================================================
// Subscriptions and top-ups
// ============================================================================

#[tokio::test]
async fn test_subscriptions_stack() {
    let (ledger, _, id) = setup(fixture(1_000, Plan::Free)).await;

    let first = ledger.subscribe(id, Plan::Standard, 200).await.unwrap();
    let second = ledger.subscribe(id, Plan::Standard, 200).await.unwrap();

    let first_expiry = first.subscription.expires_at.unwrap();
    let second_expiry = second.subscription.expires_at.unwrap();
    assert_eq!(second_expiry, first_expiry + Duration::days(30));
    assert_eq!(second.balance, 600);
    assert_eq!(second.stats.total_spent, 400);
    assert_eq!(second.transactions[0].title, "Subscription: STANDARD");
}

#[tokio::test]
async fn test_subscribe_without_funds() {
    let (ledger, _, id) = setup(fixture(100, Plan::Free)).await;

    let err = ledger.subscribe(id, Plan::Premium, 350).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            required: 350,
            available: 100
        }
    ));
}

#[tokio::test]
async fn test_top_up_records_positive_amount() {
    let (ledger, _, id) = setup(fixture(10, Plan::Free)).await;

    let account = ledger.top_up(id, 500).await.unwrap();

    assert_eq!(account.balance, 510);
    assert_eq!(account.transactions[0].title, "Balance top-up");
    assert_eq!(account.transactions[0].amount, 500);
}

#[tokio::test]
async fn test_top_up_overflow_changes_nothing() {
    let (ledger, store, id) = setup(fixture(i64::MAX - 1, Plan::Free)).await;
    let before = store.get_by_id(id).await.unwrap();

    let err = ledger.top_up(id, 5).await.unwrap_err();

    assert!(matches!(err, LedgerError::AmountOverflow("balance")));
    assert_eq!(store.get_by_id(id).await.unwrap(), before);
}

// ============================================================================
// Quota
// ============================================================================

#[tokio::test]
async fn test_quota_exhausts_on_free_plan() {
    let (ledger, _, id) = setup(fixture(0, Plan::Free)).await;

    for expected in 1..=5 {
        assert_eq!(ledger.consume_quota(id).await.unwrap().used, expected);
    }

    let err = ledger.consume_quota(id).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::QuotaExceeded {
            limit: 5,
            plan: Plan::Free
        }
    ));
}

#[tokio::test]
async fn test_quota_rolls_over_after_a_day() {
    let mut account = fixture(0, Plan::Free);
    account.quota = Quota {
        used: 5,
        last_reset: Utc::now() - Duration::hours(25),
    };
    let (ledger, _, id) = setup(account).await;

    let status = ledger.consume_quota(id).await.unwrap();

    assert_eq!(status.used, 1);
    assert!(Utc::now() - status.last_reset < Duration::minutes(1));
}

#[tokio::test]
async fn test_quota_status_does_not_write() {
    let mut account = fixture(0, Plan::Standard);
    account.quota = Quota {
        used: 999,
        last_reset: Utc::now() - Duration::hours(30),
    };
    let (ledger, store, id) = setup(account).await;

    let status = ledger.quota_status(id).await.unwrap();
    assert_eq!(status.used, 0);
    assert_eq!(status.limit, Some(1000));
    assert_eq!(store.get_by_id(id).await.unwrap().quota.used, 999);
}

#[tokio::test]
async fn test_background_quota_consumption() {
    let (ledger, store, id) = setup(fixture(0, Plan::Free)).await;

    let projected = ledger.spawn_quota_consumption(id).await.unwrap();
    assert_eq!(projected.used, 1);

    for _ in 0..50 {
        if store.get_by_id(id).await.unwrap().quota.used == 1 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("background quota write never landed");
}

#[tokio::test]
async fn test_background_quota_refuses_immediately() {
    let mut account = fixture(0, Plan::Free);
    account.quota.used = 5;
    let (ledger, _, id) = setup(account).await;

    assert!(matches!(
        ledger.spawn_quota_consumption(id).await,
        Err(LedgerError::QuotaExceeded { .. })
    ));
}

#[tokio::test]
async fn test_usage_telemetry() {
    let (ledger, _, id) = setup(fixture(0, Plan::Free)).await;

    ledger.record_token_usage(id, 120).await.unwrap();
    ledger.record_token_usage(id, 30).await.unwrap();
    let account = ledger.record_chats_count(id, 4).await.unwrap();

    assert_eq!(account.stats.tokens_used, 150);
    assert_eq!(account.stats.chats_count, 4);
    assert!(account.transactions.is_empty());
}

#[tokio::test]
async fn test_token_usage_overflow_changes_nothing() {
    let mut account = fixture(0, Plan::Free);
    account.stats.tokens_used = i64::MAX - 1;
    let (ledger, store, id) = setup(account).await;

    let err = ledger.record_token_usage(id, 5).await.unwrap_err();

    assert!(matches!(err, LedgerError::AmountOverflow("tokensUsed")));
    assert_eq!(
        store.get_by_id(id).await.unwrap().stats.tokens_used,
        i64::MAX - 1
    );
}

// ============================================================================
// Payment requests
// ============================================================================

#[tokio::test]
async fn test_approve_credits_once() {
    let (ledger, store, id) = setup(fixture(0, Plan::Free)).await;
    let admin = Uuid::new_v4();

    let request = ledger
        .create_payment_request(id, 700, "receipt.png".to_string())
        .await
        .unwrap();
    assert_eq!(request.status, PaymentStatus::Pending);

    let approved = ledger.approve_payment_request(request.id, admin).await.unwrap();
    assert_eq!(approved.status, PaymentStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(admin));
    assert!(approved.reviewed_at.is_some());
    assert_eq!(store.get_by_id(id).await.unwrap().balance, 700);

    let again = ledger.approve_payment_request(request.id, admin).await;
    assert!(matches!(again, Err(LedgerError::AlreadyProcessed)));
    let reject = ledger.reject_payment_request(request.id, admin).await;
    assert!(matches!(reject, Err(LedgerError::AlreadyProcessed)));
    assert_eq!(store.get_by_id(id).await.unwrap().balance, 700);
}

#[tokio::test]
async fn test_reject_has_no_balance_effect() {
    let (ledger, store, id) = setup(fixture(50, Plan::Free)).await;

    let request = ledger
        .create_payment_request(id, 700, "receipt.png".to_string())
        .await
        .unwrap();
    let rejected = ledger
        .reject_payment_request(request.id, Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(rejected.status, PaymentStatus::Rejected);
    assert_eq!(store.get_by_id(id).await.unwrap().balance, 50);
    assert!(ledger
        .list_payment_requests(Some(PaymentStatus::Pending))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(ledger.list_user_payment_requests(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_payment_request() {
    let (ledger, _, _) = setup(fixture(0, Plan::Free)).await;

    let err = ledger
        .approve_payment_request(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound("Payment request")));
}

#[tokio::test]
async fn test_payment_request_for_unknown_account() {
    let (ledger, _, _) = setup(fixture(0, Plan::Free)).await;

    let err = ledger
        .create_payment_request(Uuid::new_v4(), 100, "receipt.png".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

// ============================================================================
// Admin stats
// ============================================================================

#[tokio::test]
async fn test_admin_stats() {
    let store = Arc::new(MemoryAccountStore::new());
    let ledger = engine(store.clone(), SessionCache::in_memory());

    let free = fixture(1_000, Plan::Free);
    let standard = fixture(0, Plan::Standard);
    let free_id = free.id;
    store.insert(free).await;
    store.insert(standard).await;
    store
        .create(NewAccount {
            email: "new@craft.studio".to_string(),
            name: "New".to_string(),
            credential: "x".to_string(),
            avatar: None,
            role: Role::User,
        })
        .await
        .unwrap();

    ledger
        .purchase(free_id, &product(250, AccessLevel::Free))
        .await
        .unwrap();

    assert_eq!(
        ledger.admin_stats().await.unwrap(),
        AdminStats {
            total_users: 3,
            active_subs: 1,
            total_revenue: 250,
        }
    );
}

// ============================================================================
// Concurrency
// ============================================================================

/// Lets another writer slip in before each of the first `interruptions` updates
struct RacingStore {
    inner: MemoryAccountStore,
    interruptions: AtomicU32,
}

impl RacingStore {
    fn new(interruptions: u32) -> Self {
        Self {
            inner: MemoryAccountStore::new(),
            interruptions: AtomicU32::new(interruptions),
        }
    }
}

#[async_trait]
impl AccountStore for RacingStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.inner.get_by_email(email).await
    }

    async fn create(&self, draft: NewAccount) -> Result<Account, StoreError> {
        self.inner.create(draft).await
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i64,
        patch: AccountPatch,
    ) -> Result<Account, StoreError> {
        let interrupt = self
            .interruptions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if interrupt {
            // A concurrent top-up of 100 lands first
            let current = self.inner.get_by_id(id).await?;
            self.inner
                .update(
                    id,
                    current.version,
                    AccountPatch {
                        balance: Some(current.balance + 100),
                        ..Default::default()
                    },
                )
                .await?;
        }

        self.inner.update(id, expected_version, patch).await
    }

    async fn admin_stats(&self) -> Result<AdminStats, StoreError> {
        self.inner.admin_stats().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_retry_preserves_concurrent_write() {
    let store = Arc::new(RacingStore::new(1));
    let account = fixture(1_000, Plan::Free);
    let id = account.id;
    store.inner.insert(account).await;
    let ledger = engine(store.clone(), SessionCache::in_memory());

    let after = ledger
        .purchase(id, &product(400, AccessLevel::Free))
        .await
        .unwrap();

    // Both the interleaved +100 and the -400 survive
    assert_eq!(after.balance, 700);
    assert_eq!(after.version, 2);
}

#[tokio::test]
async fn test_rejection_skips_the_write() {
    let store = Arc::new(RacingStore::new(1));
    let account = fixture(350, Plan::Free);
    let id = account.id;
    store.inner.insert(account).await;
    let ledger = engine(store.clone(), SessionCache::in_memory());

    let err = ledger
        .purchase(id, &product(400, AccessLevel::Free))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    assert_eq!(store.interruptions.load(Ordering::SeqCst), 1);
    assert_eq!(store.get_by_id(id).await.unwrap().version, 0);
}

#[tokio::test]
async fn test_retry_derives_from_fresh_state() {
    let store = Arc::new(RacingStore::new(1));
    let account = fixture(350, Plan::Free);
    let id = account.id;
    store.inner.insert(account).await;
    let ledger = engine(store.clone(), SessionCache::in_memory());

    let after = ledger.subscribe(id, Plan::Standard, 200).await.unwrap();

    assert_eq!(after.balance, 250);
    assert_eq!(after.stats.total_spent, 200);
    assert_eq!(after.transactions.len(), 1);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let store = Arc::new(RacingStore::new(u32::MAX));
    let account = fixture(1_000, Plan::Free);
    let id = account.id;
    store.inner.insert(account).await;
    let ledger = engine(store.clone(), SessionCache::in_memory());

    let err = ledger.top_up(id, 50).await.unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    // Only the interfering writes landed
    let account = store.get_by_id(id).await.unwrap();
    assert_eq!(account.balance, 1_000 + 100 * DEFAULT_MAX_ATTEMPTS as i64);
    assert!(account.transactions.is_empty());
}

#[tokio::test]
async fn test_concurrent_top_ups_are_not_lost() {
    let (_, store, id) = setup(fixture(0, Plan::Free)).await;
    let ledger = LedgerEngine::new(
        store.clone(),
        Arc::new(MemoryPaymentRequestStore::new()),
        SessionCache::in_memory(),
        64,
        4,
    );

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.top_up(id, 10).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let account = store.get_by_id(id).await.unwrap();
    assert_eq!(account.balance, 200);
    assert_eq!(account.transactions.len(), 20);
}

// ============================================================================
// Session cache
// ============================================================================

#[tokio::test]
async fn test_session_cache_follows_every_write() {
    let store = Arc::new(MemoryAccountStore::new());
    let sessions = SessionCache::in_memory();
    let ledger = engine(store.clone(), sessions.clone());
    let account = fixture(0, Plan::Free);
    let id = account.id;
    store.insert(account).await;

    ledger.top_up(id, 900).await.unwrap();
    assert_eq!(sessions.load(id).await.unwrap().balance, 900);

    let item = product(300, AccessLevel::Free);
    ledger.purchase(id, &item).await.unwrap();
    let session = sessions.load(id).await.unwrap();
    assert_eq!(session.balance, 600);
    assert_eq!(session.inventory, vec![item.id.to_string()]);

    // A refused operation leaves the cache as it was
    ledger.subscribe(id, Plan::Premium, 10_000).await.unwrap_err();
    assert_eq!(sessions.load(id).await.unwrap().balance, 600);
}

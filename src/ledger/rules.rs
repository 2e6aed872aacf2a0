//! Pure business rules: each function derives the next state of an account
//! from the state that was just read, or refuses.

use chrono::{DateTime, Duration, Utc};

use super::LedgerError;
use crate::models::{
    Account, Plan, Product, Quota, QuotaStatus, Stats, Subscription, TransactionRecord,
    QUOTA_WINDOW_HOURS, SUBSCRIPTION_PERIOD_DAYS,
};
use crate::store::AccountPatch;

/// Amount actually charged for a product on the given plan
pub fn effective_price(plan: Plan, price: i64) -> i64 {
    if plan.purchases_are_free() {
        0
    } else {
        price
    }
}

/// Renewals extend from the later of the current expiry and `now`
pub fn next_expiry(current: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let base = match current {
        Some(expires_at) if expires_at > now => expires_at,
        _ => now,
    };
    base + Duration::days(SUBSCRIPTION_PERIOD_DAYS)
}

/// Quota as it stands at `now`: once more than one window has passed since
/// the last reset, usage counts from zero again.
pub fn effective_quota(quota: Quota, now: DateTime<Utc>) -> Quota {
    if now - quota.last_reset > Duration::hours(QUOTA_WINDOW_HOURS) {
        Quota {
            used: 0,
            last_reset: now,
        }
    } else {
        quota
    }
}

pub fn quota_status(account: &Account, now: DateTime<Utc>) -> QuotaStatus {
    let quota = effective_quota(account.quota, now);
    QuotaStatus {
        plan: account.plan(),
        used: quota.used,
        limit: account.plan().daily_quota(),
        last_reset: quota.last_reset,
    }
}

fn with_transaction(account: &Account, record: TransactionRecord) -> Vec<TransactionRecord> {
    let mut transactions = Vec::with_capacity(account.transactions.len() + 1);
    transactions.push(record);
    transactions.extend(account.transactions.iter().cloned());
    transactions
}

fn checked_sum(current: i64, amount: i64, field: &'static str) -> Result<i64, LedgerError> {
    current
        .checked_add(amount)
        .ok_or(LedgerError::AmountOverflow(field))
}

fn with_spent(stats: Stats, amount: i64) -> Result<Stats, LedgerError> {
    Ok(Stats {
        total_spent: checked_sum(stats.total_spent, amount, "totalSpent")?,
        ..stats
    })
}

fn ensure_funds(account: &Account, required: i64) -> Result<(), LedgerError> {
    if account.balance < required {
        return Err(LedgerError::InsufficientFunds {
            required,
            available: account.balance,
        });
    }
    Ok(())
}

pub fn purchase(
    account: &Account,
    product: &Product,
    now: DateTime<Utc>,
) -> Result<AccountPatch, LedgerError> {
    let product_id = product.id.to_string();
    if account.owns(&product_id) {
        return Err(LedgerError::AlreadyOwned);
    }

    let plan = account.plan();
    if !plan.can_access(product.access_level) {
        return Err(LedgerError::AccessDenied {
            plan,
            required: product.access_level,
        });
    }

    let price = effective_price(plan, product.price);
    let title = if plan.purchases_are_free() {
        format!("received free: {}", product.title)
    } else {
        ensure_funds(account, price)?;
        format!("purchased: {}", product.title)
    };

    let mut inventory = account.inventory.clone();
    inventory.push(product_id);

    Ok(AccountPatch {
        balance: Some(account.balance - price),
        inventory: Some(inventory),
        stats: Some(with_spent(account.stats, price)?),
        transactions: Some(with_transaction(
            account,
            TransactionRecord::new(title, price, now),
        )),
        ..Default::default()
    })
}

pub fn subscribe(
    account: &Account,
    plan: Plan,
    price: i64,
    now: DateTime<Utc>,
) -> Result<AccountPatch, LedgerError> {
    if price < 0 {
        return Err(LedgerError::InvalidAmount(price));
    }
    if price > 0 {
        ensure_funds(account, price)?;
    }

    let title = format!("Subscription: {}", plan.as_str().to_uppercase());

    Ok(AccountPatch {
        balance: (price > 0).then(|| account.balance - price),
        subscription: Some(Subscription {
            plan,
            expires_at: Some(next_expiry(account.subscription.expires_at, now)),
        }),
        stats: Some(with_spent(account.stats, price)?),
        transactions: Some(with_transaction(
            account,
            TransactionRecord::new(title, price, now),
        )),
        ..Default::default()
    })
}

pub fn top_up(
    account: &Account,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<AccountPatch, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(amount));
    }

    Ok(AccountPatch {
        balance: Some(checked_sum(account.balance, amount, "balance")?),
        transactions: Some(with_transaction(
            account,
            TransactionRecord::new("Balance top-up", amount, now),
        )),
        ..Default::default()
    })
}

pub fn consume_quota(account: &Account, now: DateTime<Utc>) -> Result<AccountPatch, LedgerError> {
    let quota = effective_quota(account.quota, now);
    let plan = account.plan();

    if let Some(limit) = plan.daily_quota() {
        if quota.used >= limit {
            return Err(LedgerError::QuotaExceeded { limit, plan });
        }
    }

    Ok(AccountPatch {
        quota: Some(Quota {
            used: quota.used.saturating_add(1),
            last_reset: quota.last_reset,
        }),
        ..Default::default()
    })
}

pub fn record_tokens(account: &Account, tokens: i64) -> Result<AccountPatch, LedgerError> {
    Ok(AccountPatch {
        stats: Some(Stats {
            tokens_used: checked_sum(account.stats.tokens_used, tokens, "tokensUsed")?,
            ..account.stats
        }),
        ..Default::default()
    })
}

pub fn record_chats(account: &Account, count: i64) -> AccountPatch {
    AccountPatch {
        stats: Some(Stats {
            chats_count: count,
            ..account.stats
        }),
        ..Default::default()
    }
}

//! Marketplace, subscription and balance DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{PaymentStatus, Plan};

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Checked against `Plan::parse`, unknown names are refused
    pub plan: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TopUpRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(length(min = 1))]
    pub screenshot: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequestQuery {
    pub status: Option<PaymentStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenUsageRequest {
    #[validate(range(min = 1))]
    pub tokens: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatsCountRequest {
    #[validate(range(min = 0))]
    pub count: i64,
}

/// Usage inside the current window, after rollover is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub plan: Plan,
    pub used: u32,
    /// `None` when the plan is unlimited
    pub limit: Option<u32>,
    pub last_reset: DateTime<Utc>,
}

impl QuotaStatus {
    pub fn remaining(&self) -> Option<u32> {
        self.limit.map(|limit| limit.saturating_sub(self.used))
    }
}

/// Entry in the public plan list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOffer {
    pub id: Plan,
    pub name: &'static str,
    pub price: i64,
    pub period_days: i64,
    pub daily_quota: Option<u32>,
    pub features: Vec<&'static str>,
}

impl From<Plan> for PlanOffer {
    fn from(plan: Plan) -> Self {
        Self {
            id: plan,
            name: plan.display_name(),
            price: plan.price(),
            period_days: super::SUBSCRIPTION_PERIOD_DAYS,
            daily_quota: plan.daily_quota(),
            features: plan.features(),
        }
    }
}

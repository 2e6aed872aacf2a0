//! Data models for the Craft Studio backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod auth;
pub mod billing;
pub use auth::*;
pub use billing::*;

/// Length of one subscription period
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

/// Length of the rolling usage window for AI quota
pub const QUOTA_WINDOW_HOURS: i64 = 24;

/// A registered user with balance, entitlements and history.
///
/// The credential is a bcrypt hash for every account created by this service.
/// Rows imported from the legacy store may still hold plain text until their
/// next successful login.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub credential: String,
    pub avatar: Option<String>,
    pub role: Role,
    /// Minor currency units
    pub balance: i64,
    pub quota: Quota,
    /// Owned product ids, no duplicates
    pub inventory: Vec<String>,
    pub subscription: Subscription,
    pub stats: Stats,
    /// Most recent first
    pub transactions: Vec<TransactionRecord>,
    /// Incremented by the store on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn owns(&self, product_id: &str) -> bool {
        self.inventory.iter().any(|id| id == product_id)
    }

    pub fn plan(&self) -> Plan {
        self.subscription.plan
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Fields required to insert a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub credential: String,
    pub avatar: Option<String>,
    pub role: Role,
}

/// AI usage inside the current rolling window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Quota {
    pub used: u32,
    /// Stored as epoch milliseconds, like the documents written by the web client
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_reset: DateTime<Utc>,
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            used: 0,
            last_reset: DateTime::<Utc>::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subscription {
    pub plan: Plan,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub tokens_used: i64,
    pub chats_count: i64,
    pub total_spent: i64,
}

/// One entry in an account's history. Amounts are always stored positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub amount: i64,
}

impl TransactionRecord {
    pub fn new(title: impl Into<String>, amount: i64, date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            title: title.into(),
            date,
            amount,
        }
    }
}

/// Subscription tier.
///
/// Older documents used `pro` and `enterprise`; they are folded into
/// `standard` and `premium` when read, and anything unrecognised reads as `free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Plan {
    #[default]
    Free,
    Standard,
    Premium,
}

impl From<String> for Plan {
    fn from(value: String) -> Self {
        Plan::from_stored(&value)
    }
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Standard, Plan::Premium];

    pub fn from_stored(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "standard" | "pro" => Plan::Standard,
            "premium" | "enterprise" => Plan::Premium,
            _ => Plan::Free,
        }
    }

    /// Canonical names only; legacy names are folded when stored documents are read
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Plan::Free),
            "standard" => Some(Plan::Standard),
            "premium" => Some(Plan::Premium),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Standard => "standard",
            Plan::Premium => "premium",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Standard => "Standard",
            Plan::Premium => "Premium",
        }
    }

    /// Price of one subscription period
    pub fn price(&self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Standard => 200,
            Plan::Premium => 350,
        }
    }

    /// AI calls allowed per rolling window; `None` means unlimited
    pub fn daily_quota(&self) -> Option<u32> {
        match self {
            Plan::Free => Some(5),
            Plan::Standard => Some(1000),
            Plan::Premium => None,
        }
    }

    /// Access matrix: free sees free items, standard adds standard items, premium sees everything
    pub fn can_access(&self, level: AccessLevel) -> bool {
        match self {
            Plan::Premium => true,
            Plan::Standard => matches!(level, AccessLevel::Free | AccessLevel::Standard),
            Plan::Free => level == AccessLevel::Free,
        }
    }

    /// Premium subscribers receive catalog items at no charge
    pub fn purchases_are_free(&self) -> bool {
        matches!(self, Plan::Premium)
    }

    pub fn features(&self) -> Vec<&'static str> {
        match self {
            Plan::Free => vec!["5 AI requests per day", "Basic AI access", "Community support"],
            Plan::Standard => vec![
                "1,000 AI requests per day",
                "Access to standard products",
                "Help and support",
            ],
            Plan::Premium => vec![
                "Unlimited AI requests",
                "All products free of charge",
                "Exclusive features and early access",
            ],
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from_stored(&value)
    }
}

impl Role {
    pub fn from_stored(value: &str) -> Self {
        match value.trim() {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

/// Minimum plan a product requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AccessLevel {
    #[default]
    Free,
    Standard,
    Premium,
}

impl From<String> for AccessLevel {
    fn from(value: String) -> Self {
        AccessLevel::from_stored(Some(value.as_str()))
    }
}

impl AccessLevel {
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("standard") => AccessLevel::Standard,
            Some("premium") => AccessLevel::Premium,
            _ => AccessLevel::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Free => "free",
            AccessLevel::Standard => "standard",
            AccessLevel::Premium => "premium",
        }
    }
}

/// Catalog item. Read-only to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub price: i64,
    pub image: Option<String>,
    pub description: Option<String>,
    /// Only shown to owners
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchased_content: Option<String>,
    #[serde(default)]
    pub access_level: AccessLevel,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Copy suitable for a caller who does not own the product
    pub fn public_view(&self) -> Product {
        Product {
            purchased_content: None,
            ..self.clone()
        }
    }
}

/// Fields for inserting a catalog item
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(range(min = 0))]
    pub price: i64,
    pub image: Option<String>,
    pub description: Option<String>,
    pub purchased_content: Option<String>,
    #[serde(default)]
    pub access_level: AccessLevel,
}

/// Partial product update; absent fields are kept
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub purchased_content: Option<String>,
    pub access_level: Option<AccessLevel>,
}

impl ProductPatch {
    pub fn apply(self, product: &mut Product) {
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(image) = self.image {
            product.image = Some(image);
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(content) = self.purchased_content {
            product.purchased_content = Some(content);
        }
        if let Some(level) = self.access_level {
            product.access_level = level;
        }
    }
}

/// Catalog inserted into an empty products table
pub fn default_products() -> Vec<NewProduct> {
    let item = |title: &str, category: &str, price: i64, image: &str, description: &str| NewProduct {
        title: title.to_string(),
        category: category.to_string(),
        price,
        image: Some(image.to_string()),
        description: Some(description.to_string()),
        purchased_content: None,
        access_level: AccessLevel::Free,
    };

    let mut react = item(
        "React Mastery Course",
        "Course",
        990,
        "https://images.unsplash.com/photo-1633356122544-f134324a6cee?w=800&auto=format&fit=crop&q=60",
        "A complete React course from zero to pro.",
    );
    react.purchased_content = Some("Course link: https://udemy.com/course/react-mastery".to_string());

    vec![
        react,
        item(
            "AI Prompt Pack",
            "Digital",
            390,
            "https://images.unsplash.com/photo-1677442136019-21780ecad995?w=800&auto=format&fit=crop&q=60",
            "A collection of the best prompts for GPT-4.",
        ),
        item(
            "UI Kit Pro",
            "Asset",
            590,
            "https://images.unsplash.com/photo-1558655146-d09347e92766?w=800&auto=format&fit=crop&q=60",
            "A component set for a fast start.",
        ),
        item(
            "Advanced Python",
            "Course",
            1190,
            "https://images.unsplash.com/photo-1526379095098-d400fd0bf935?w=800&auto=format&fit=crop&q=60",
            "Advanced Python development techniques.",
        ),
    ]
}

/// Top-up request lifecycle: pending, then exactly one terminal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "approved" => Some(PaymentStatus::Approved),
            "rejected" => Some(PaymentStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// A user's request to have their balance topped up, with proof of payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    /// Opaque reference to the uploaded proof image
    pub screenshot: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
}

/// Aggregates for the admin console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: i64,
    pub active_subs: i64,
    pub total_revenue: i64,
}

use thiserror::Error;

use crate::models::{AccessLevel, Plan};
use crate::store::StoreError;

/// Reasons a ledger operation was refused or could not complete.
///
/// Every variant except `Conflict` and `Transient` is detected before the
/// account is written, so the account is unchanged when one is returned.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient funds: {required} required, {available} available")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Product is already owned")]
    AlreadyOwned,

    #[error("Payment request has already been processed")]
    AlreadyProcessed,

    #[error("Daily AI quota of {limit} requests reached on the {plan} plan")]
    QuotaExceeded { limit: u32, plan: Plan },

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("The {plan} plan has no access to {} products", .required.as_str())]
    AccessDenied { plan: Plan, required: AccessLevel },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Amount would overflow {0}")]
    AmountOverflow(&'static str),

    #[error("Store unavailable: {0}")]
    Transient(String),
}

impl LedgerError {
    /// True for refusals that leave the account untouched and are worth showing to the user
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::Conflict(_) | LedgerError::Transient(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => LedgerError::NotFound("Account"),
            StoreError::VersionConflict => {
                LedgerError::Conflict("account was modified concurrently".to_string())
            }
            StoreError::Conflict(msg) => LedgerError::Conflict(msg),
            StoreError::Database(msg) => LedgerError::Transient(msg),
        }
    }
}

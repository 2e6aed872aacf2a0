//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthService;
use crate::config::Config;
use crate::ledger::LedgerEngine;
use crate::session::SessionCache;
use crate::store::{AccountStore, ProductCatalog, Stores};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub ledger: LedgerEngine,
    pub accounts: Arc<dyn AccountStore>,
    pub products: Arc<dyn ProductCatalog>,
}

impl AppState {
    /// Wire services over the given stores and session cache
    pub fn new(stores: Stores, sessions: SessionCache, config: &Config) -> Self {
        let ledger = LedgerEngine::new(
            stores.accounts.clone(),
            stores.payment_requests.clone(),
            sessions.clone(),
            config.ledger_max_attempts,
            config.bcrypt_cost,
        );

        let auth_service = Arc::new(AuthService::new(
            stores.accounts.clone(),
            ledger.clone(),
            sessions,
            config,
        ));

        Self {
            auth_service,
            ledger,
            accounts: stores.accounts,
            products: stores.products,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for LedgerEngine {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ledger.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ProductCatalog> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.products.clone()
    }
}

//! Session cache
//!
//! A credential-free copy of each signed-in account, rewritten wholesale from
//! the store after every ledger write. The store remains the source of truth;
//! a failed cache write is logged and the previous entry is kept.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Account, SessionAccount};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session serialization failed: {0}")]
    Serialization(String),

    #[error("Session backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Raw storage for serialized session payloads, keyed by account id
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_raw(&self, user_id: Uuid) -> Result<Option<String>, SessionError>;

    async fn put_raw(&self, user_id: Uuid, payload: String) -> Result<(), SessionError>;

    async fn delete(&self, user_id: Uuid) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct MemorySessionRepository {
    entries: RwLock<HashMap<Uuid, String>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn get_raw(&self, user_id: Uuid) -> Result<Option<String>, SessionError> {
        Ok(self.entries.read().await.get(&user_id).cloned())
    }

    async fn put_raw(&self, user_id: Uuid, payload: String) -> Result<(), SessionError> {
        self.entries.write().await.insert(user_id, payload);
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> Result<(), SessionError> {
        self.entries.write().await.remove(&user_id);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SessionCache {
    repository: Arc<dyn SessionRepository>,
}

impl SessionCache {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self { repository }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionRepository::new()))
    }

    /// Replace the cached entry with `account`, minus its credential.
    /// Never fails; errors are logged.
    pub async fn refresh(&self, account: &Account) {
        if let Err(e) = self.try_refresh(account).await {
            tracing::warn!(user_id = %account.id, error = %e, "Session cache refresh failed");
        }
    }

    async fn try_refresh(&self, account: &Account) -> Result<(), SessionError> {
        let payload = serde_json::to_string(&SessionAccount::from(account))?;
        self.repository.put_raw(account.id, payload).await
    }

    /// Cached session, with defaults filled in for fields older payloads lack.
    /// Unreadable entries are treated as missing.
    pub async fn load(&self, user_id: Uuid) -> Option<SessionAccount> {
        let raw = match self.repository.get_raw(user_id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Session cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<SessionAccount>(&raw) {
            Ok(session) if session.id == user_id => Some(session),
            Ok(_) => {
                tracing::warn!(user_id = %user_id, "Session cache entry belongs to another account");
                None
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Discarding unreadable session entry");
                None
            }
        }
    }

    pub async fn clear(&self, user_id: Uuid) {
        if let Err(e) = self.repository.delete(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Session cache clear failed");
        }
    }
}

//! Session persistence contract.
//!
//! The engine never mutates stored state in place. It loads a versioned copy,
//! changes the copy, and writes it back with `compare_and_swap`; a concurrent
//! writer makes that write fail with [`StoreError::Conflict`] and the engine
//! starts over from a fresh read.

use crate::error::StoreError;
use crate::session::SessionRecord;
use async_trait::async_trait;
use shared::SessionId;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<Versioned<SessionRecord>>, StoreError>;

    /// Stores a brand-new record at version 1. Fails if its id or room code is taken.
    async fn insert(&self, record: SessionRecord) -> Result<(), StoreError>;

    /// Replaces the record only if it is still at `expected_version`. Returns the new version.
    async fn compare_and_swap(
        &self,
        id: &SessionId,
        expected_version: u64,
        record: SessionRecord,
    ) -> Result<u64, StoreError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<SessionId>, StoreError>;
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, Versioned<SessionRecord>>,
    codes: HashMap<String, SessionId>,
}

/// In-memory store. Everything is lost on restart.
pub struct InMemorySessionStore {
    tables: RwLock<Tables>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Versioned<SessionRecord>>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.sessions.get(id).cloned())
    }

    async fn insert(&self, record: SessionRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let id = record.id().clone();
        let code = record.session.code.clone();

        if tables.sessions.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("session {}", id)));
        }
        if tables.codes.contains_key(&code) {
            return Err(StoreError::Duplicate(format!("room code {}", code)));
        }

        tables.codes.insert(code, id.clone());
        tables.sessions.insert(
            id,
            Versioned {
                version: 1,
                value: record,
            },
        );
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        id: &SessionId,
        expected_version: u64,
        record: SessionRecord,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::Missing(format!("session {}", id)))?;

        if stored.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: stored.version,
            });
        }

        stored.version += 1;
        stored.value = record;
        Ok(stored.version)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<SessionId>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.codes.get(code).cloned())
    }
}

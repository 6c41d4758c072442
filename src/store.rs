//! Keyed paste storage with TTL expiry.
//!
//! Both transports talk to storage only through [`PasteStore`]. The one hard
//! requirement on an implementation is that [`PasteStore::create`] is an atomic
//! create-if-absent across every concurrent caller: it is what stops two
//! allocators from both believing they won the same identifier.

use crate::error::StoreError;
use crate::models::PasteRecord;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait PasteStore: Send + Sync {
    /// Live content for `id`, or `None` if it never existed or has expired.
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stores `content` under `id` only if no live paste holds that id.
    ///
    /// Returns `false` on collision, leaving the existing paste untouched.
    async fn create(&self, id: &str, content: &[u8]) -> Result<bool, StoreError>;

    /// Reclaims space held by expired pastes, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// In-process store with the same TTL semantics as the SQLite backend.
pub struct MemoryStore {
    ttl: Duration,
    pastes: Mutex<HashMap<String, PasteRecord>>,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pastes: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live pastes.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.lock().values().filter(|p| p.is_live_at(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PasteRecord>> {
        // Map operations cannot panic midway, so a poisoned map is still consistent.
        self.pastes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PasteStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Utc::now();
        Ok(self
            .lock()
            .get(id)
            .filter(|p| p.is_live_at(now))
            .map(|p| p.content.clone()))
    }

    async fn create(&self, id: &str, content: &[u8]) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut pastes = self.lock();

        if pastes.get(id).is_some_and(|p| p.is_live_at(now)) {
            return Ok(false);
        }

        pastes.insert(id.to_string(), PasteRecord::new(id, content, now, self.ttl));
        Ok(true)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut pastes = self.lock();
        let before = pastes.len();
        pastes.retain(|_, p| p.is_live_at(now));
        Ok((before - pastes.len()) as u64)
    }
}

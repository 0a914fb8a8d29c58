//! In-process blacklist storage.

use async_trait::async_trait;
use dashmap::DashMap;
use time::Duration;

use super::BlacklistStorage;
use crate::AuthResult;
use crate::blacklist::BlacklistEntry;
use crate::clock::{SharedClock, system_clock};

struct StoredEntry {
    entry: BlacklistEntry,
    /// Unix timestamp after which the entry is gone; `None` never expires.
    expires_at: Option<i64>,
}

impl StoredEntry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Blacklist storage backed by a concurrent hash map.
///
/// Expired entries are dropped lazily when read, or in bulk by
/// [`purge_expired`](Self::purge_expired). Expiry is measured with the
/// injected clock so tests can move time.
pub struct InMemoryStorage {
    entries: DashMap<String, StoredEntry>,
    clock: SharedClock,
}

impl InMemoryStorage {
    /// Creates an empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Creates an empty store measuring expiry with `clock`.
    #[must_use]
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Returns the number of stored entries, including expired ones not yet
    /// purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.timestamp();
        let before = self.entries.len();
        self.entries.retain(|_, stored| !stored.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged expired blacklist entries");
        }
        removed
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlacklistStorage for InMemoryStorage {
    async fn add(&self, key: &str, entry: BlacklistEntry, ttl: Duration) -> AuthResult<()> {
        let expires_at = self.clock.timestamp().saturating_add(ttl.whole_seconds());
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                entry,
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn forever(&self, key: &str, entry: BlacklistEntry) -> AuthResult<()> {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                entry,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> AuthResult<Option<BlacklistEntry>> {
        let now = self.clock.timestamp();
        if let Some(stored) = self.entries.get(key) {
            if !stored.is_expired(now) {
                return Ok(Some(stored.entry));
            }
            // Entry expired, remove it
            drop(stored);
            self.entries.remove_if(key, |_, stored| stored.is_expired(now));
        }
        Ok(None)
    }

    async fn destroy(&self, key: &str) -> AuthResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn flush(&self) -> AuthResult<()> {
        self.entries.clear();
        Ok(())
    }
}

//! Storage backends for the blacklist.
//!
//! The [`Blacklist`](crate::blacklist::Blacklist) talks to its backing store
//! through [`BlacklistStorage`]. Any key/value store with per-key expiry can
//! implement it; [`InMemoryStorage`] is provided for single-process
//! deployments and tests.

mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;
use time::Duration;

use crate::AuthResult;
use crate::blacklist::BlacklistEntry;

/// Key/value store holding blacklist entries.
///
/// Writes for the same key must replace the previous entry atomically; the
/// last write wins.
#[async_trait]
pub trait BlacklistStorage: Send + Sync {
    /// Stores `entry` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn add(&self, key: &str, entry: BlacklistEntry, ttl: Duration) -> AuthResult<()>;

    /// Stores `entry` under `key` without expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn forever(&self, key: &str, entry: BlacklistEntry) -> AuthResult<()>;

    /// Returns the live entry for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, key: &str) -> AuthResult<Option<BlacklistEntry>>;

    /// Deletes the entry for `key`. Returns `true` if one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn destroy(&self, key: &str) -> AuthResult<bool>;

    /// Deletes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn flush(&self) -> AuthResult<()>;
}

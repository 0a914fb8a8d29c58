//! Token revocation ledger.
//!
//! A payload is blacklisted under the value of its key claim (`jti` by
//! default). Entries either take effect after a grace period, so that
//! concurrent requests carrying the same token still succeed for a moment,
//! or are permanent.
//!
//! ```text
//!   absent ──add──────────► Graced { valid_until = now + grace }
//!   absent ──add_forever──► Forever
//!   any ─────remove/clear─► absent
//! ```
//!
//! Graced entries live in storage until the token could no longer be used or
//! refreshed, plus one minute.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Duration;

use crate::AuthResult;
use crate::claims::names;
use crate::clock::SharedClock;
use crate::error::AuthError;
use crate::payload::Payload;
use crate::storage::BlacklistStorage;
use crate::validation::DEFAULT_REFRESH_TTL;

/// Marker stored for permanent revocations.
const FOREVER: &str = "forever";

/// A stored revocation.
///
/// Serializes as `"forever"` or `{"valid_until": <unix timestamp>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryRepr", into = "EntryRepr")]
pub enum BlacklistEntry {
    /// Revoked once `now >= valid_until`.
    Graced {
        /// Unix timestamp at which the revocation takes effect.
        valid_until: i64,
    },
    /// Revoked permanently.
    Forever,
}

impl BlacklistEntry {
    /// Returns `true` if the entry revokes the token at `now`.
    #[must_use]
    pub fn is_active(&self, now: i64) -> bool {
        match self {
            Self::Forever => true,
            Self::Graced { valid_until } => now >= *valid_until,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EntryRepr {
    Marker(String),
    Graced { valid_until: i64 },
}

impl TryFrom<EntryRepr> for BlacklistEntry {
    type Error = String;

    fn try_from(repr: EntryRepr) -> Result<Self, Self::Error> {
        match repr {
            EntryRepr::Marker(marker) if marker == FOREVER => Ok(Self::Forever),
            EntryRepr::Marker(marker) => Err(format!("unknown blacklist marker: {marker}")),
            EntryRepr::Graced { valid_until } => Ok(Self::Graced { valid_until }),
        }
    }
}

impl From<BlacklistEntry> for EntryRepr {
    fn from(entry: BlacklistEntry) -> Self {
        match entry {
            BlacklistEntry::Forever => Self::Marker(FOREVER.to_string()),
            BlacklistEntry::Graced { valid_until } => Self::Graced { valid_until },
        }
    }
}

/// Revocation ledger on top of a [`BlacklistStorage`].
#[derive(Clone)]
pub struct Blacklist {
    storage: Arc<dyn BlacklistStorage>,
    clock: SharedClock,
    grace_period: i64,
    refresh_ttl: Option<i64>,
    key: String,
}

impl Blacklist {
    /// Creates a blacklist with no grace period, a 20160 minute refresh
    /// window and `jti` as the key claim.
    #[must_use]
    pub fn new(storage: Arc<dyn BlacklistStorage>, clock: SharedClock) -> Self {
        Self {
            storage,
            clock,
            grace_period: 0,
            refresh_ttl: Some(DEFAULT_REFRESH_TTL),
            key: names::JWT_ID.to_string(),
        }
    }

    /// Sets the grace period in seconds.
    #[must_use]
    pub fn with_grace_period(mut self, seconds: i64) -> Self {
        self.grace_period = seconds;
        self
    }

    /// Sets the refresh window in minutes.
    #[must_use]
    pub fn with_refresh_ttl(mut self, minutes: Option<i64>) -> Self {
        self.refresh_ttl = minutes;
        self
    }

    /// Sets the claim whose value keys the entries.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the grace period in seconds.
    pub fn set_grace_period(&mut self, seconds: i64) -> &mut Self {
        self.grace_period = seconds;
        self
    }

    /// Sets the refresh window in minutes.
    pub fn set_refresh_ttl(&mut self, minutes: Option<i64>) -> &mut Self {
        self.refresh_ttl = minutes;
        self
    }

    /// Sets the key claim.
    pub fn set_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.key = key.into();
        self
    }

    /// Returns the grace period in seconds.
    #[must_use]
    pub fn grace_period(&self) -> i64 {
        self.grace_period
    }

    /// Returns the refresh window in minutes.
    #[must_use]
    pub fn refresh_ttl(&self) -> Option<i64> {
        self.refresh_ttl
    }

    /// Returns the key claim name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Blacklists `payload` after the grace period.
    ///
    /// Payloads without `exp` (and, when no refresh window is configured,
    /// every payload) are blacklisted forever. An existing entry is left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClaim` if the key claim is missing, or a storage error.
    pub async fn add(&self, payload: &Payload) -> AuthResult<bool> {
        let Some(exp) = payload.claim(names::EXPIRATION).and_then(|c| c.timestamp()) else {
            return self.add_forever(payload).await;
        };
        let Some(refresh_ttl) = self.refresh_ttl else {
            return self.add_forever(payload).await;
        };

        let key = self.key_of(payload)?;
        if self.storage.get(&key).await?.is_some() {
            return Ok(true);
        }

        let now = self.clock.timestamp();
        let iat = payload.claim(names::ISSUED_AT).and_then(|c| c.timestamp());
        let ttl = Self::minutes_until_unusable(now, exp, iat, refresh_ttl);
        let entry = BlacklistEntry::Graced {
            valid_until: now.saturating_add(self.grace_period),
        };

        self.storage.add(&key, entry, Duration::minutes(ttl)).await?;
        tracing::debug!(key = %key, ttl_minutes = ttl, "Token blacklisted");
        Ok(true)
    }

    /// Blacklists `payload` permanently.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClaim` if the key claim is missing, or a storage error.
    pub async fn add_forever(&self, payload: &Payload) -> AuthResult<bool> {
        let key = self.key_of(payload)?;
        self.storage.forever(&key, BlacklistEntry::Forever).await?;
        tracing::debug!(key = %key, "Token blacklisted forever");
        Ok(true)
    }

    /// Returns `true` if `payload` is currently revoked.
    ///
    /// A payload without the key claim was never blacklisted.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn has(&self, payload: &Payload) -> AuthResult<bool> {
        let Some(key) = self.key_value(payload) else {
            return Ok(false);
        };
        let revoked = self
            .storage
            .get(&key)
            .await?
            .is_some_and(|entry| entry.is_active(self.clock.timestamp()));
        Ok(revoked)
    }

    /// Removes `payload` from the blacklist. Returns `true` if it was there.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClaim` if the key claim is missing, or a storage error.
    pub async fn remove(&self, payload: &Payload) -> AuthResult<bool> {
        let key = self.key_of(payload)?;
        self.storage.destroy(&key).await
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn clear(&self) -> AuthResult<()> {
        self.storage.flush().await?;
        tracing::debug!("Blacklist cleared");
        Ok(())
    }

    /// Returns the storage key for `payload`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClaim` if the key claim is missing or null.
    pub fn key_of(&self, payload: &Payload) -> AuthResult<String> {
        self.key_value(payload)
            .ok_or_else(|| AuthError::invalid_claim(&self.key))
    }

    fn key_value(&self, payload: &Payload) -> Option<String> {
        match payload.get(&self.key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Minutes until the token can neither be used nor refreshed, plus one.
    fn minutes_until_unusable(now: i64, exp: i64, iat: Option<i64>, refresh_ttl: i64) -> i64 {
        let refreshable_until =
            iat.map_or(exp, |iat| iat.saturating_add(refresh_ttl.saturating_mul(60)));
        let seconds = exp
            .max(refreshable_until)
            .saturating_add(60)
            .saturating_sub(now);
        seconds.saturating_add(59).div_euclid(60).max(1)
    }
}

impl fmt::Debug for Blacklist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blacklist")
            .field("grace_period", &self.grace_period)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimCollection, ClaimFactory};
    use crate::clock::FixedClock;
    use crate::storage::InMemoryStorage;
    use crate::validation::{PayloadValidator, ValidationMode};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const NOW: i64 = 1_700_000_000;

    /// Records writes so the computed TTL can be asserted.
    #[derive(Default)]
    struct RecordingStorage {
        inner: InMemoryStorage,
        added: Mutex<Vec<(String, BlacklistEntry, Duration)>>,
        forever: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlacklistStorage for RecordingStorage {
        async fn add(&self, key: &str, entry: BlacklistEntry, ttl: Duration) -> AuthResult<()> {
            self.added
                .lock()
                .unwrap()
                .push((key.to_string(), entry, ttl));
            self.inner.add(key, entry, ttl).await
        }

        async fn forever(&self, key: &str, entry: BlacklistEntry) -> AuthResult<()> {
            self.forever.lock().unwrap().push(key.to_string());
            self.inner.forever(key, entry).await
        }

        async fn get(&self, key: &str) -> AuthResult<Option<BlacklistEntry>> {
            self.inner.get(key).await
        }

        async fn destroy(&self, key: &str) -> AuthResult<bool> {
            self.inner.destroy(key).await
        }

        async fn flush(&self) -> AuthResult<()> {
            self.inner.flush().await
        }
    }

    struct Fixture {
        clock: Arc<FixedClock>,
        storage: Arc<RecordingStorage>,
        blacklist: Blacklist,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::at(NOW));
        let storage = Arc::new(RecordingStorage {
            inner: InMemoryStorage::with_clock(clock.clone()),
            ..Default::default()
        });
        let blacklist = Blacklist::new(storage.clone(), clock.clone()).with_refresh_ttl(Some(20161));
        Fixture {
            clock,
            storage,
            blacklist,
        }
    }

    fn payload(clock: &Arc<FixedClock>, claims: serde_json::Value) -> Payload {
        let factory = ClaimFactory::new(clock.clone());
        let validator = PayloadValidator::new(clock.clone()).with_required_claims(Vec::<String>::new());
        let serde_json::Value::Object(map) = claims else {
            unreachable!()
        };
        let claims = map
            .into_iter()
            .map(|(name, value)| factory.get(&name, value).unwrap())
            .collect::<ClaimCollection>();
        Payload::new(claims, &validator, ValidationMode::Payload).unwrap()
    }

    fn standard_payload(clock: &Arc<FixedClock>) -> Payload {
        payload(
            clock,
            json!({
                "sub": 1,
                "iss": "http://example.com",
                "exp": NOW + 3600,
                "nbf": NOW,
                "iat": NOW,
                "jti": "foo",
            }),
        )
    }

    #[tokio::test]
    async fn test_add_stores_graced_entry_with_ttl() {
        let f = fixture();
        let payload = standard_payload(&f.clock);

        assert!(f.blacklist.add(&payload).await.unwrap());

        let added = f.storage.added.lock().unwrap().clone();
        assert_eq!(added.len(), 1);
        let (key, entry, ttl) = &added[0];
        assert_eq!(key, "foo");
        assert_eq!(*entry, BlacklistEntry::Graced { valid_until: NOW });
        assert_eq!(*ttl, Duration::minutes(20162));
    }

    #[tokio::test]
    async fn test_add_is_noop_when_entry_exists() {
        let f = fixture();
        let payload = standard_payload(&f.clock);

        f.blacklist.add(&payload).await.unwrap();
        assert!(f.blacklist.add(&payload).await.unwrap());
        assert_eq!(f.storage.added.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_without_exp_is_forever() {
        let f = fixture();
        let payload = payload(&f.clock, json!({"sub": 1, "jti": "foo"}));

        assert!(f.blacklist.add(&payload).await.unwrap());
        assert_eq!(*f.storage.forever.lock().unwrap(), vec!["foo".to_string()]);
        assert!(f.storage.added.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_grace_period() {
        let f = fixture();
        let blacklist = f.blacklist.clone().with_grace_period(15);
        let payload = standard_payload(&f.clock);

        blacklist.add(&payload).await.unwrap();
        assert!(!blacklist.has(&payload).await.unwrap());

        f.clock.advance(Duration::seconds(14));
        assert!(!blacklist.has(&payload).await.unwrap());

        f.clock.advance(Duration::seconds(1));
        assert!(blacklist.has(&payload).await.unwrap());
    }

    #[tokio::test]
    async fn test_far_future_exp_stays_blacklisted() {
        let f = fixture();
        let payload = payload(
            &f.clock,
            json!({"sub": 1, "exp": i64::MAX, "iat": NOW, "jti": "foo"}),
        );

        assert!(f.blacklist.add(&payload).await.unwrap());
        let ttl = f.storage.added.lock().unwrap()[0].2;
        assert_eq!(ttl, Duration::minutes((i64::MAX - NOW + 59) / 60));

        f.clock.advance(Duration::minutes(2));
        assert!(f.blacklist.has(&payload).await.unwrap());

        f.clock.advance(Duration::days(3650));
        assert!(f.blacklist.has(&payload).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_grace_period_is_immediate() {
        let f = fixture();
        let payload = standard_payload(&f.clock);

        assert!(!f.blacklist.has(&payload).await.unwrap());
        f.blacklist.add(&payload).await.unwrap();
        assert!(f.blacklist.has(&payload).await.unwrap());
    }

    #[tokio::test]
    async fn test_forever_and_remove() {
        let f = fixture();
        let payload = standard_payload(&f.clock);

        f.blacklist.add_forever(&payload).await.unwrap();
        f.clock.advance(Duration::days(365));
        assert!(f.blacklist.has(&payload).await.unwrap());

        assert!(f.blacklist.remove(&payload).await.unwrap());
        assert!(!f.blacklist.has(&payload).await.unwrap());
        assert!(!f.blacklist.remove(&payload).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear() {
        let f = fixture();
        let payload = standard_payload(&f.clock);
        f.blacklist.add(&payload).await.unwrap();

        f.blacklist.clear().await.unwrap();
        assert!(!f.blacklist.has(&payload).await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_key_claim() {
        let f = fixture();
        let blacklist = f.blacklist.clone().with_key("sub");
        let payload = standard_payload(&f.clock);

        blacklist.add(&payload).await.unwrap();
        assert_eq!(f.storage.added.lock().unwrap()[0].0, "1");
        assert!(blacklist.has(&payload).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_claim() {
        let f = fixture();
        let payload = payload(&f.clock, json!({"sub": 1, "exp": NOW + 60}));

        // Nothing was ever stored under a missing key
        assert!(!f.blacklist.has(&payload).await.unwrap());

        let err = f.blacklist.add(&payload).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClaim { ref claim } if claim == "jti"));
        assert!(f.blacklist.add_forever(&payload).await.is_err());
        assert!(f.blacklist.remove(&payload).await.is_err());
    }

    #[tokio::test]
    async fn test_no_refresh_window_blacklists_forever() {
        let f = fixture();
        let blacklist = f.blacklist.clone().with_refresh_ttl(None);
        blacklist.add(&standard_payload(&f.clock)).await.unwrap();
        assert_eq!(f.storage.forever.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_minutes_until_unusable() {
        // Refresh window dominates
        assert_eq!(
            Blacklist::minutes_until_unusable(NOW, NOW + 3600, Some(NOW), 20161),
            20162
        );
        // exp dominates, partial minutes round up
        assert_eq!(
            Blacklist::minutes_until_unusable(NOW, NOW + 7230, Some(NOW), 60),
            122
        );
        // Missing iat uses exp only
        assert_eq!(Blacklist::minutes_until_unusable(NOW, NOW + 600, None, 60), 11);
        // Never below one minute
        assert_eq!(Blacklist::minutes_until_unusable(NOW, NOW - 600, None, 60), 1);
        // Extreme timestamps saturate instead of wrapping
        assert_eq!(
            Blacklist::minutes_until_unusable(NOW, i64::MAX, Some(NOW), 20160),
            (i64::MAX - NOW + 59) / 60
        );
        assert_eq!(
            Blacklist::minutes_until_unusable(NOW, NOW + 3600, Some(i64::MAX), i64::MAX),
            (i64::MAX - NOW + 59) / 60
        );
    }

    #[test]
    fn test_entry_serialization() {
        assert_eq!(
            serde_json::to_value(BlacklistEntry::Forever).unwrap(),
            json!("forever")
        );
        assert_eq!(
            serde_json::to_value(BlacklistEntry::Graced { valid_until: NOW }).unwrap(),
            json!({"valid_until": NOW})
        );
        assert_eq!(
            serde_json::from_value::<BlacklistEntry>(json!({"valid_until": 5})).unwrap(),
            BlacklistEntry::Graced { valid_until: 5 }
        );
        assert!(serde_json::from_value::<BlacklistEntry>(json!("sometimes")).is_err());
    }
}

//! Claim construction and default claim values.

use std::collections::HashMap;

use rand::distributions::{Alphanumeric, DistString};
use serde_json::Value;

use super::claim::{Claim, ClaimKind, names};
use crate::AuthResult;
use crate::clock::SharedClock;
use crate::error::AuthError;

/// Default access token lifetime in minutes.
pub const DEFAULT_TTL: i64 = 60;

/// Length of generated `jti` values.
const JTI_LENGTH: usize = 16;

/// Maps claim names to the kind they are constructed as.
///
/// Names that are not registered become [`ClaimKind::Custom`] claims.
#[derive(Debug, Clone)]
pub struct ClaimRegistry {
    kinds: HashMap<String, ClaimKind>,
}

impl ClaimRegistry {
    /// Creates a registry without any registered names.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Registers (or re-registers) `name` as `kind`.
    pub fn register(&mut self, name: impl Into<String>, kind: ClaimKind) {
        self.kinds.insert(name.into(), kind);
    }

    /// Returns the registered kind for `name`.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<ClaimKind> {
        self.kinds.get(name).copied()
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }
}

impl Default for ClaimRegistry {
    /// The seven registered JWT claims.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(names::AUDIENCE, ClaimKind::Audience);
        registry.register(names::EXPIRATION, ClaimKind::Expiration);
        registry.register(names::ISSUED_AT, ClaimKind::IssuedAt);
        registry.register(names::ISSUER, ClaimKind::Issuer);
        registry.register(names::JWT_ID, ClaimKind::JwtId);
        registry.register(names::NOT_BEFORE, ClaimKind::NotBefore);
        registry.register(names::SUBJECT, ClaimKind::Subject);
        registry
    }
}

/// Builds typed claims and computes default claim values.
#[derive(Debug, Clone)]
pub struct ClaimFactory {
    registry: ClaimRegistry,
    clock: SharedClock,
    issuer: String,
    ttl: Option<i64>,
    leeway: i64,
}

impl ClaimFactory {
    /// Creates a factory with the default registry, a 60 minute TTL, no
    /// leeway and an empty issuer.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            registry: ClaimRegistry::default(),
            clock,
            issuer: String::new(),
            ttl: Some(DEFAULT_TTL),
            leeway: 0,
        }
    }

    /// Sets the issuer used for the `iss` default.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the token lifetime in minutes; `None` means tokens never expire.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<i64>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the leeway (seconds) given to datetime claims.
    #[must_use]
    pub fn with_leeway(mut self, leeway: i64) -> Self {
        self.leeway = leeway;
        self
    }

    /// Replaces the registry.
    #[must_use]
    pub fn with_registry(mut self, registry: ClaimRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a claim name so that [`get`](Self::get) builds it as `kind`.
    pub fn extend(&mut self, name: impl Into<String>, kind: ClaimKind) -> &mut Self {
        self.registry.register(name, kind);
        self
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Builds a claim from a name and value.
    ///
    /// Registered names produce typed claims (datetime kinds receive the
    /// factory's leeway); anything else becomes a custom claim.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidClaim`] if a typed claim rejects the value.
    pub fn get(&self, name: &str, value: impl Into<Value>) -> AuthResult<Claim> {
        match self.registry.kind_of(name) {
            Some(kind) => {
                let leeway = if kind.is_datetime() { self.leeway } else { 0 };
                Claim::new(kind, name, value, leeway, self.clock.now())
            }
            None => Ok(Claim::custom(name, value)),
        }
    }

    /// Builds a registered claim with its computed default value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `name` has no default (or is
    /// `exp` while the TTL is `None`).
    pub fn make(&self, name: &str) -> AuthResult<Claim> {
        self.make_with_ttl(name, self.ttl)
    }

    /// Like [`make`](Self::make) with an explicit TTL for `exp`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `name` has no default.
    pub fn make_with_ttl(&self, name: &str, ttl: Option<i64>) -> AuthResult<Claim> {
        let value: Value = match name {
            names::ISSUER => self.iss().into(),
            names::ISSUED_AT => self.iat().into(),
            names::NOT_BEFORE => self.nbf().into(),
            names::JWT_ID => self.jti().into(),
            names::EXPIRATION => match ttl {
                Some(ttl) => self.exp(ttl).into(),
                None => {
                    return Err(AuthError::configuration(
                        "Cannot compute [exp] without a TTL",
                    ));
                }
            },
            other => {
                return Err(AuthError::configuration(format!(
                    "No default value for claim [{other}]"
                )));
            }
        };
        self.get(name, value)
    }

    /// Default `iss`: the configured issuer.
    #[must_use]
    pub fn iss(&self) -> String {
        self.issuer.clone()
    }

    /// Default `iat`: now.
    #[must_use]
    pub fn iat(&self) -> i64 {
        self.clock.timestamp()
    }

    /// Default `nbf`: now.
    #[must_use]
    pub fn nbf(&self) -> i64 {
        self.clock.timestamp()
    }

    /// Default `exp`: now plus `ttl` minutes.
    #[must_use]
    pub fn exp(&self, ttl: i64) -> i64 {
        self.clock
            .timestamp()
            .saturating_add(ttl.saturating_mul(60))
    }

    /// Default `jti`: a random alphanumeric string.
    #[must_use]
    pub fn jti(&self) -> String {
        Alphanumeric.sample_string(&mut rand::thread_rng(), JTI_LENGTH)
    }

    /// Returns the token lifetime in minutes.
    #[must_use]
    pub fn ttl(&self) -> Option<i64> {
        self.ttl
    }

    /// Returns the leeway in seconds.
    #[must_use]
    pub fn leeway(&self) -> i64 {
        self.leeway
    }

    /// Returns the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the clock.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

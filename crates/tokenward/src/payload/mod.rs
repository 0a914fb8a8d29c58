//! Validated, read-only token payloads.

mod factory;

pub use factory::{DEFAULT_CLAIMS, PayloadBuilder, PayloadFactory};

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::AuthResult;
use crate::claims::{Claim, ClaimCollection};
use crate::error::AuthError;
use crate::validation::{PayloadValidator, ValidationMode};

/// A claim collection that passed validation.
///
/// A payload can only be obtained through validation and cannot be changed
/// afterwards. [`insert`](Self::insert) and [`remove`](Self::remove) exist for
/// callers that expect a mutable map and always fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    claims: ClaimCollection,
}

impl Payload {
    /// Validates `claims` in `mode` and wraps them.
    ///
    /// # Errors
    ///
    /// Propagates the validator's error.
    pub fn new(
        claims: ClaimCollection,
        validator: &PayloadValidator,
        mode: ValidationMode,
    ) -> AuthResult<Self> {
        let claims = validator.check(claims, mode)?;
        Ok(Self { claims })
    }

    /// Returns the underlying claims.
    #[must_use]
    pub fn claims(&self) -> &ClaimCollection {
        &self.claims
    }

    /// Returns the typed claim called `name`.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Claim> {
        self.claims.get(name)
    }

    /// Looks a value up by claim name or by dot path into nested values.
    ///
    /// `"user.roles.0"` walks into the `user` claim's object, then its `roles`
    /// array. An exact claim name always wins over path interpretation.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(claim) = self.claims.get(key) {
            return Some(claim.value());
        }

        let mut segments = key.split('.');
        let first = segments.next()?;
        let mut current = self.claims.get(first)?.value();
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Looks up several keys at once; see [`get`](Self::get).
    #[must_use]
    pub fn get_many<S: AsRef<str>>(&self, keys: &[S]) -> Vec<Option<&Value>> {
        keys.iter().map(|key| self.get(key.as_ref())).collect()
    }

    /// Returns the whole payload as a plain map.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        self.claims.to_plain_map()
    }

    /// Returns `true` if a claim called `name` exists.
    #[must_use]
    pub fn has_key(&self, name: &str) -> bool {
        self.claims.has(name)
    }

    /// Returns `true` if a claim with the same name and value exists.
    #[must_use]
    pub fn has(&self, claim: &Claim) -> bool {
        self.claims.get(claim.name()).is_some_and(|own| own == claim)
    }

    /// Returns `true` if every entry of `values` matches the claim of the same
    /// name, using loose comparison. An empty map never matches.
    #[must_use]
    pub fn matches(&self, values: &Map<String, Value>) -> bool {
        self.matches_with(values, false)
    }

    /// Like [`matches`](Self::matches) with type-sensitive comparison.
    #[must_use]
    pub fn matches_strict(&self, values: &Map<String, Value>) -> bool {
        self.matches_with(values, true)
    }

    fn matches_with(&self, values: &Map<String, Value>, strict: bool) -> bool {
        !values.is_empty()
            && values.iter().all(|(name, value)| {
                self.claims
                    .get(name)
                    .is_some_and(|claim| claim.matches(value, strict))
            })
    }

    /// Returns the number of claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if there are no claims.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Serializes the payload as a JSON object string.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.to_map()).to_string()
    }

    /// Always fails: payloads are immutable.
    ///
    /// # Errors
    ///
    /// Always returns [`AuthError::PayloadImmutable`].
    pub fn insert(&mut self, _name: &str, _value: impl Into<Value>) -> AuthResult<()> {
        Err(AuthError::PayloadImmutable)
    }

    /// Always fails: payloads are immutable.
    ///
    /// # Errors
    ///
    /// Always returns [`AuthError::PayloadImmutable`].
    pub fn remove(&mut self, _name: &str) -> AuthResult<()> {
        Err(AuthError::PayloadImmutable)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

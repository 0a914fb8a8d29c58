//! Payload validation rules.

use crate::AuthResult;
use crate::claims::{ClaimCollection, names};
use crate::clock::SharedClock;
use crate::error::AuthError;

/// Default refresh window in minutes (two weeks).
pub const DEFAULT_REFRESH_TTL: i64 = 20160;

/// Which rule set a payload is checked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValidationMode {
    /// Normal validation: the token must be currently valid.
    #[default]
    Payload,
    /// Refresh flow: expiry is ignored but the refresh window applies.
    Refresh,
}

impl ValidationMode {
    /// Maps a refresh flag onto a mode.
    #[must_use]
    pub fn from_refresh_flow(refresh: bool) -> Self {
        if refresh { Self::Refresh } else { Self::Payload }
    }
}

/// Returns the default set of required claims.
#[must_use]
pub fn default_required_claims() -> Vec<String> {
    [
        names::ISSUER,
        names::ISSUED_AT,
        names::EXPIRATION,
        names::NOT_BEFORE,
        names::SUBJECT,
        names::JWT_ID,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Checks claim collections for completeness and temporal validity.
///
/// The validator holds configuration only; "now" is read from the clock on
/// every call and the mode is passed per call.
#[derive(Debug, Clone)]
pub struct PayloadValidator {
    required_claims: Vec<String>,
    refresh_ttl: Option<i64>,
    clock: SharedClock,
}

impl PayloadValidator {
    /// Creates a validator with the default required claims and refresh TTL.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            required_claims: default_required_claims(),
            refresh_ttl: Some(DEFAULT_REFRESH_TTL),
            clock,
        }
    }

    /// Sets the required claim names.
    #[must_use]
    pub fn with_required_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the refresh window in minutes; `None` disables the window check.
    #[must_use]
    pub fn with_refresh_ttl(mut self, refresh_ttl: Option<i64>) -> Self {
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// Returns the required claim names.
    #[must_use]
    pub fn required_claims(&self) -> &[String] {
        &self.required_claims
    }

    /// Returns the refresh window in minutes.
    #[must_use]
    pub fn refresh_ttl(&self) -> Option<i64> {
        self.refresh_ttl
    }

    /// Validates `claims` and hands them back unchanged.
    ///
    /// Completeness is checked first, then each claim in collection order;
    /// the first failing claim determines the error.
    ///
    /// # Errors
    ///
    /// Returns `MissingRequiredClaims`, `TokenExpired` or `TokenNotYetValid`.
    pub fn check(&self, claims: ClaimCollection, mode: ValidationMode) -> AuthResult<ClaimCollection> {
        self.verify(&claims, mode)?;
        Ok(claims)
    }

    /// Validates `claims` without taking ownership.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub fn verify(&self, claims: &ClaimCollection, mode: ValidationMode) -> AuthResult<()> {
        if !claims.has_all(&self.required_claims) {
            return Err(AuthError::MissingRequiredClaims);
        }

        let now = self.clock.timestamp();
        for claim in claims {
            match mode {
                ValidationMode::Payload => claim.validate_payload(now)?,
                ValidationMode::Refresh => claim.validate_refresh(now, self.refresh_ttl)?,
            }
        }
        Ok(())
    }

    /// Returns `true` if `claims` pass [`verify`](Self::verify).
    #[must_use]
    pub fn is_valid(&self, claims: &ClaimCollection, mode: ValidationMode) -> bool {
        self.verify(claims, mode).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Claim, ClaimFactory};
    use crate::clock::FixedClock;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000;

    fn setup() -> (ClaimFactory, PayloadValidator) {
        let clock: SharedClock = Arc::new(FixedClock::at(NOW));
        (
            ClaimFactory::new(clock.clone()),
            PayloadValidator::new(clock),
        )
    }

    fn collection(factory: &ClaimFactory, exp: i64, nbf: i64, iat: i64) -> ClaimCollection {
        vec![
            factory.get("sub", 1).unwrap(),
            factory.get("iss", "http://example.com").unwrap(),
            factory.get("exp", exp).unwrap(),
            factory.get("nbf", nbf).unwrap(),
            factory.get("iat", iat).unwrap(),
            factory.get("jti", "foo").unwrap(),
        ]
        .into()
    }

    #[test]
    fn test_valid_collection_passes() {
        let (factory, validator) = setup();
        let claims = collection(&factory, NOW + 3600, NOW, NOW);
        let checked = validator.check(claims.clone(), ValidationMode::Payload).unwrap();
        assert_eq!(checked, claims);
        assert!(validator.is_valid(&claims, ValidationMode::Refresh));
    }

    #[test]
    fn test_missing_required_claim() {
        let (factory, validator) = setup();
        let mut claims = collection(&factory, NOW + 3600, NOW, NOW);
        claims.remove("jti");

        let err = validator.check(claims, ValidationMode::Payload).unwrap_err();
        assert!(matches!(err, AuthError::MissingRequiredClaims));
    }

    #[test]
    fn test_completeness_is_checked_before_claims() {
        let (factory, validator) = setup();
        let mut claims = collection(&factory, NOW - 10, NOW, NOW - 20);
        claims.remove("sub");
        assert!(matches!(
            validator.verify(&claims, ValidationMode::Payload),
            Err(AuthError::MissingRequiredClaims)
        ));
    }

    #[test]
    fn test_expired_collection() {
        let (factory, validator) = setup();
        let claims = collection(&factory, NOW - 1440, NOW - 3660, NOW - 3660);
        let err = validator.verify(&claims, ValidationMode::Payload).unwrap_err();
        assert_eq!(err.to_string(), "Token has expired");

        // Still refreshable
        assert!(validator.verify(&claims, ValidationMode::Refresh).is_ok());
    }

    #[test]
    fn test_future_not_before() {
        let (factory, validator) = setup();
        let claims = collection(&factory, NOW + 1440, NOW + 3660, NOW);
        let err = validator.verify(&claims, ValidationMode::Payload).unwrap_err();
        assert!(matches!(err, AuthError::TokenNotYetValid { .. }));
    }

    #[test]
    fn test_refresh_window() {
        let (factory, validator) = setup();
        let validator = validator.with_refresh_ttl(Some(60));

        let inside = collection(&factory, NOW - 1000, NOW - 2600, NOW - 2600);
        assert!(validator.verify(&inside, ValidationMode::Refresh).is_ok());

        let outside = collection(&factory, NOW - 1000, NOW - 5000, NOW - 5000);
        let err = validator.verify(&outside, ValidationMode::Refresh).unwrap_err();
        assert!(err.is_refresh_expired());

        let unbounded = validator.with_refresh_ttl(None);
        assert!(unbounded.verify(&outside, ValidationMode::Refresh).is_ok());
    }

    #[test]
    fn test_custom_required_claims() {
        let (_, validator) = setup();
        let validator = validator.with_required_claims(["foo"]);
        let claims: ClaimCollection = vec![Claim::custom("foo", "bar")].into();
        assert!(validator.is_valid(&claims, ValidationMode::Payload));
        assert!(!validator.is_valid(&ClaimCollection::new(), ValidationMode::Payload));
    }

    #[test]
    fn test_mode_from_refresh_flow() {
        assert_eq!(ValidationMode::from_refresh_flow(true), ValidationMode::Refresh);
        assert_eq!(ValidationMode::from_refresh_flow(false), ValidationMode::Payload);
        assert_eq!(ValidationMode::default(), ValidationMode::Payload);
    }
}

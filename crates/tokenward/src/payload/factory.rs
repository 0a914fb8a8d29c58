use serde_json::{Map, Value};

use super::Payload;
use crate::AuthResult;
use crate::claims::{ClaimCollection, ClaimFactory, names};
use crate::validation::{PayloadValidator, ValidationMode};

/// Claims added to every new payload unless supplied explicitly.
pub const DEFAULT_CLAIMS: [&str; 5] = [
    names::ISSUER,
    names::ISSUED_AT,
    names::EXPIRATION,
    names::NOT_BEFORE,
    names::JWT_ID,
];

/// Assembles payloads from default, carried and custom claims.
#[derive(Debug, Clone)]
pub struct PayloadFactory {
    claim_factory: ClaimFactory,
    validator: PayloadValidator,
    default_claims: Vec<String>,
}

impl PayloadFactory {
    /// Creates a factory with the standard default claims.
    #[must_use]
    pub fn new(claim_factory: ClaimFactory, validator: PayloadValidator) -> Self {
        Self {
            claim_factory,
            validator,
            default_claims: DEFAULT_CLAIMS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Replaces the list of default claim names.
    #[must_use]
    pub fn with_default_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the default claim names.
    #[must_use]
    pub fn default_claims(&self) -> &[String] {
        &self.default_claims
    }

    /// Returns the claim factory.
    #[must_use]
    pub fn claim_factory(&self) -> &ClaimFactory {
        &self.claim_factory
    }

    /// Mutable access, mainly for [`ClaimFactory::extend`].
    pub fn claim_factory_mut(&mut self) -> &mut ClaimFactory {
        &mut self.claim_factory
    }

    /// Returns the payload validator.
    #[must_use]
    pub fn validator(&self) -> &PayloadValidator {
        &self.validator
    }

    /// Starts building a payload.
    #[must_use]
    pub fn builder(&self) -> PayloadBuilder<'_> {
        PayloadBuilder {
            factory: self,
            custom: Map::new(),
            carried: None,
            ttl: None,
            mode: ValidationMode::Payload,
        }
    }

    /// Validates a prebuilt collection and wraps it.
    ///
    /// # Errors
    ///
    /// Propagates the validator's error.
    pub fn with_claims(&self, claims: ClaimCollection, mode: ValidationMode) -> AuthResult<Payload> {
        Payload::new(claims, &self.validator, mode)
    }

    /// Rebuilds a payload from a decoded claim map, adding no defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClaim` for values a typed claim rejects, or the
    /// validator's error.
    pub fn from_map(&self, map: Map<String, Value>, mode: ValidationMode) -> AuthResult<Payload> {
        let claims = map
            .into_iter()
            .map(|(name, value)| self.claim_factory.get(&name, value))
            .collect::<AuthResult<ClaimCollection>>()?;
        self.with_claims(claims, mode)
    }
}

/// Per-call payload assembly state.
///
/// Obtained from [`PayloadFactory::builder`]; nothing set here outlives the
/// call to [`make`](Self::make).
#[derive(Debug)]
pub struct PayloadBuilder<'a> {
    factory: &'a PayloadFactory,
    custom: Map<String, Value>,
    carried: Option<ClaimCollection>,
    ttl: Option<Option<i64>>,
    mode: ValidationMode,
}

impl PayloadBuilder<'_> {
    /// Adds a custom claim. Later values for the same name win.
    #[must_use]
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(name.into(), value.into());
        self
    }

    /// Adds several custom claims.
    #[must_use]
    pub fn claims<I, K>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (name, value) in claims {
            self.custom.insert(name.into(), value);
        }
        self
    }

    /// Starts from the claims of a previous payload.
    #[must_use]
    pub fn carry_from(mut self, payload: &Payload) -> Self {
        self.carried = Some(payload.claims().clone());
        self
    }

    /// Overrides the token lifetime in minutes; `None` omits `exp`.
    #[must_use]
    pub fn ttl(mut self, ttl: Option<i64>) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the validation mode.
    #[must_use]
    pub fn mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validates in refresh mode when `refresh` is set.
    #[must_use]
    pub fn refresh_flow(self, refresh: bool) -> Self {
        self.mode(ValidationMode::from_refresh_flow(refresh))
    }

    /// Builds and validates the payload.
    ///
    /// With `reset_claims` the carried claims are dropped. Defaults are only
    /// computed for names not supplied as custom claims; they replace carried
    /// values, and custom claims replace everything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClaim` for rejected custom values, or the validator's
    /// error.
    pub fn make(self, reset_claims: bool) -> AuthResult<Payload> {
        let claim_factory = &self.factory.claim_factory;
        let ttl = self.ttl.unwrap_or_else(|| claim_factory.ttl());

        let mut claims = match self.carried {
            Some(carried) if !reset_claims => carried,
            _ => ClaimCollection::new(),
        };

        for name in &self.factory.default_claims {
            if self.custom.contains_key(name) {
                continue;
            }
            if name == names::EXPIRATION && ttl.is_none() {
                claims.remove(names::EXPIRATION);
                continue;
            }
            claims.insert(claim_factory.make_with_ttl(name, ttl)?);
        }

        for (name, value) in self.custom {
            claims.insert(claim_factory.get(&name, value)?);
        }

        self.factory.with_claims(claims, self.mode)
    }
}

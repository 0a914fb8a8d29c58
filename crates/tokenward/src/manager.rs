//! Token lifecycle orchestration.
//!
//! The [`Manager`] ties the pieces together: it turns payloads into signed
//! tokens through the [`JwtProvider`], rebuilds and validates payloads from
//! tokens, consults the [`Blacklist`] and implements the refresh and
//! invalidate flows.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::AuthResult;
use crate::blacklist::Blacklist;
use crate::claims::names;
use crate::error::AuthError;
use crate::payload::{Payload, PayloadFactory};
use crate::provider::JwtProvider;
use crate::token::Token;
use crate::validation::ValidationMode;

/// Options for [`Manager::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Blacklist the old token permanently instead of after the grace period.
    pub force_forever: bool,
    /// Do not carry the old token's claims over to the new one.
    pub reset_claims: bool,
}

/// Encodes, decodes, refreshes and invalidates tokens.
pub struct Manager {
    provider: Arc<dyn JwtProvider>,
    payload_factory: PayloadFactory,
    blacklist: Blacklist,
    blacklist_enabled: bool,
    show_blacklist_exception: bool,
    persistent_claims: Vec<String>,
}

impl Manager {
    /// Creates a manager with the blacklist and blacklist errors enabled and
    /// no persistent claims.
    #[must_use]
    pub fn new(
        provider: Arc<dyn JwtProvider>,
        payload_factory: PayloadFactory,
        blacklist: Blacklist,
    ) -> Self {
        Self {
            provider,
            payload_factory,
            blacklist,
            blacklist_enabled: true,
            show_blacklist_exception: true,
            persistent_claims: Vec::new(),
        }
    }

    /// Enables or disables the blacklist.
    #[must_use]
    pub fn with_blacklist_enabled(mut self, enabled: bool) -> Self {
        self.blacklist_enabled = enabled;
        self
    }

    /// Controls whether decoding a blacklisted token fails.
    #[must_use]
    pub fn with_blacklist_exception(mut self, enabled: bool) -> Self {
        self.show_blacklist_exception = enabled;
        self
    }

    /// Sets the claims copied from the old token on refresh.
    #[must_use]
    pub fn with_persistent_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.persistent_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    /// Signs `payload` into a token.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if the provider fails, or `TokenMalformed` if it
    /// returns something that is not a token.
    pub fn encode(&self, payload: &Payload) -> AuthResult<Token> {
        let raw = self.provider.encode(&payload.to_map())?;
        Token::new(raw)
    }

    /// Verifies `token` and rebuilds its payload.
    ///
    /// When `check_blacklist` is set (and the blacklist and its errors are
    /// enabled) a revoked token fails with `TokenBlacklisted`.
    ///
    /// # Errors
    ///
    /// Returns the provider's, the payload validator's or the blacklist's
    /// error.
    pub async fn decode(&self, token: &Token, check_blacklist: bool) -> AuthResult<Payload> {
        self.decode_with_mode(token, ValidationMode::Payload, check_blacklist)
            .await
    }

    async fn decode_with_mode(
        &self,
        token: &Token,
        mode: ValidationMode,
        check_blacklist: bool,
    ) -> AuthResult<Payload> {
        let claims = self.provider.decode(token.as_str()).inspect_err(|e| {
            tracing::debug!(error = %e, "Failed to decode token");
        })?;
        let payload = self.payload_factory.from_map(claims, mode)?;

        if check_blacklist
            && self.blacklist_enabled
            && self.show_blacklist_exception
            && self.blacklist.has(&payload).await?
        {
            tracing::debug!(
                key = %self.blacklist.key_of(&payload).unwrap_or_default(),
                "Token revoked"
            );
            return Err(AuthError::TokenBlacklisted);
        }

        Ok(payload)
    }

    /// Exchanges `token` for a new one.
    ///
    /// The old token may be expired but must still be inside its refresh
    /// window and not blacklisted. It is blacklisted before the new token is
    /// built; if that fails, no new token is issued.
    ///
    /// The new payload is made of `custom_claims`, the configured persistent
    /// claims, the old `sub` and a fresh `iat`, on top of the old claims
    /// unless [`RefreshOptions::reset_claims`] is set.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` once the refresh window is closed,
    /// `TokenBlacklisted`, or any decode, storage or signing error.
    pub async fn refresh(
        &self,
        token: &Token,
        options: RefreshOptions,
        custom_claims: Map<String, Value>,
    ) -> AuthResult<Token> {
        // 1. Decode the old token in the refresh flow
        let payload = self
            .decode_with_mode(token, ValidationMode::Refresh, true)
            .await?;

        // 2. Revoke it before anything new exists
        if self.blacklist_enabled {
            if options.force_forever {
                self.blacklist.add_forever(&payload).await?;
            } else {
                self.blacklist.add(&payload).await?;
            }
        }

        // 3. Build the replacement payload
        let mut builder = self
            .payload_factory
            .builder()
            .carry_from(&payload)
            .claims(custom_claims);
        for name in &self.persistent_claims {
            if let Some(value) = payload.get(name) {
                builder = builder.claim(name.as_str(), value.clone());
            }
        }
        if let Some(sub) = payload.get(names::SUBJECT) {
            builder = builder.claim(names::SUBJECT, sub.clone());
        }
        let iat = self.payload_factory.claim_factory().iat();
        let refreshed = builder
            .claim(names::ISSUED_AT, iat)
            .make(options.reset_claims)?;

        // 4. Sign it
        let token = self.encode(&refreshed)?;
        tracing::debug!(
            force_forever = options.force_forever,
            reset_claims = options.reset_claims,
            "Token refreshed"
        );
        Ok(token)
    }

    /// Blacklists `token`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the blacklist is disabled, or any
    /// decode or storage error.
    pub async fn invalidate(&self, token: &Token, force_forever: bool) -> AuthResult<bool> {
        if !self.blacklist_enabled {
            return Err(AuthError::configuration(
                "You must have the blacklist enabled to invalidate a token.",
            ));
        }

        let payload = self.decode(token, false).await?;
        let added = if force_forever {
            self.blacklist.add_forever(&payload).await?
        } else {
            self.blacklist.add(&payload).await?
        };
        tracing::debug!(force_forever, "Token invalidated");
        Ok(added)
    }

    /// Returns the signing provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn JwtProvider> {
        &self.provider
    }

    /// Returns the payload factory.
    #[must_use]
    pub fn payload_factory(&self) -> &PayloadFactory {
        &self.payload_factory
    }

    /// Mutable access, e.g. to register custom claim kinds.
    pub fn payload_factory_mut(&mut self) -> &mut PayloadFactory {
        &mut self.payload_factory
    }

    /// Returns the blacklist.
    #[must_use]
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Mutable access to the blacklist settings.
    pub fn blacklist_mut(&mut self) -> &mut Blacklist {
        &mut self.blacklist
    }

    /// Returns `true` if the blacklist is enabled.
    #[must_use]
    pub fn is_blacklist_enabled(&self) -> bool {
        self.blacklist_enabled
    }

    /// Returns `true` if decoding fails for blacklisted tokens.
    #[must_use]
    pub fn shows_blacklist_exception(&self) -> bool {
        self.show_blacklist_exception
    }

    /// Returns the claims carried over on refresh.
    #[must_use]
    pub fn persistent_claims(&self) -> &[String] {
        &self.persistent_claims
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("payload_factory", &self.payload_factory)
            .field("blacklist", &self.blacklist)
            .field("blacklist_enabled", &self.blacklist_enabled)
            .field("show_blacklist_exception", &self.show_blacklist_exception)
            .field("persistent_claims", &self.persistent_claims)
            .finish_non_exhaustive()
    }
}

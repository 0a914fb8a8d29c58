//! Signing providers.
//!
//! The [`Manager`](crate::Manager) never touches cryptography itself; it
//! hands flattened claim maps to a [`JwtProvider`] and gets token strings
//! back (and vice versa). The provider only signs and verifies. Expiry,
//! not-before and every other claim rule is checked by the core after
//! decoding.

mod jwt;

pub use jwt::{JsonWebTokenProvider, SigningAlgorithm};

use serde_json::{Map, Value};

use crate::AuthResult;

/// Signs claim maps into token strings and verifies them again.
pub trait JwtProvider: Send + Sync {
    /// Signs `claims` into a token string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`](crate::AuthError::Signing) on failure.
    fn encode(&self, claims: &Map<String, Value>) -> AuthResult<String>;

    /// Verifies `token` and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenInvalidSignature`](crate::AuthError::TokenInvalidSignature)
    /// if the token cannot be verified.
    fn decode(&self, token: &str) -> AuthResult<Map<String, Value>>;
}

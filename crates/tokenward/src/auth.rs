//! Per-request token facade.
//!
//! [`JwtAuth`] holds the token of the current request and offers the common
//! operations on it: issue a token for a subject, check it, read claims,
//! refresh and invalidate. Subjects are locked to their model with the `prv`
//! claim so that a token issued for one kind of subject is not accepted for
//! another with the same identifier.
//!
//! # Example
//!
//! ```ignore
//! use tokenward::{JwtAuth, JwtSubject};
//!
//! struct User { id: u64 }
//!
//! impl JwtSubject for User {
//!     fn jwt_identifier(&self) -> serde_json::Value {
//!         self.id.into()
//!     }
//! }
//!
//! let mut auth = JwtAuth::new(manager.clone());
//! let token = auth.from_subject(&User { id: 1 })?;
//!
//! auth.set_token(token.as_str())?;
//! let payload = auth.check_or_fail().await?;
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::AuthResult;
use crate::claims::names;
use crate::error::AuthError;
use crate::manager::{Manager, RefreshOptions};
use crate::payload::Payload;
use crate::token::Token;

/// Something a token can be issued for.
pub trait JwtSubject {
    /// Value of the `sub` claim.
    fn jwt_identifier(&self) -> Value;

    /// Extra claims added to every token issued for this subject.
    fn jwt_custom_claims(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Name of the subject's model, hashed into the `prv` claim.
    fn jwt_subject_model(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Returns the `prv` value for a subject model.
#[must_use]
pub fn subject_model_hash(model: &str) -> String {
    hex::encode(Sha256::digest(model.as_bytes()))
}

/// Token operations for a single request.
#[derive(Debug, Clone)]
pub struct JwtAuth {
    manager: Arc<Manager>,
    token: Option<Token>,
    custom_claims: Map<String, Value>,
    lock_subject: bool,
}

impl JwtAuth {
    /// Creates a facade without a token. Subject locking is on.
    #[must_use]
    pub fn new(manager: Arc<Manager>) -> Self {
        Self {
            manager,
            token: None,
            custom_claims: Map::new(),
            lock_subject: true,
        }
    }

    /// Sets the token to operate on.
    ///
    /// # Errors
    ///
    /// Returns `TokenMalformed` if `token` is not structurally valid.
    pub fn set_token(&mut self, token: impl Into<String>) -> AuthResult<&mut Self> {
        self.token = Some(Token::new(token)?);
        Ok(self)
    }

    /// Forgets the current token.
    pub fn unset_token(&mut self) -> &mut Self {
        self.token = None;
        self
    }

    /// Returns the current token.
    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Adds custom claims to tokens issued or refreshed through this facade.
    pub fn claims(&mut self, claims: Map<String, Value>) -> &mut Self {
        self.custom_claims.extend(claims);
        self
    }

    /// Returns the inline custom claims.
    #[must_use]
    pub fn custom_claims(&self) -> &Map<String, Value> {
        &self.custom_claims
    }

    /// Enables or disables the `prv` claim on issued tokens.
    pub fn lock_subject(&mut self, lock: bool) -> &mut Self {
        self.lock_subject = lock;
        self
    }

    /// Issues a token for `subject`.
    ///
    /// The payload contains `sub`, `prv` (when locking), the subject's custom
    /// claims and the inline custom claims, in increasing precedence.
    ///
    /// # Errors
    ///
    /// Returns any payload or signing error.
    pub fn from_subject<S: JwtSubject + ?Sized>(&self, subject: &S) -> AuthResult<Token> {
        let mut claims = Map::new();
        claims.insert(names::SUBJECT.to_string(), subject.jwt_identifier());
        if self.lock_subject {
            claims.insert(
                names::SUBJECT_MODEL.to_string(),
                Value::String(subject_model_hash(&subject.jwt_subject_model())),
            );
        }
        claims.extend(subject.jwt_custom_claims());
        claims.extend(self.custom_claims.clone());

        let payload = self
            .manager
            .payload_factory()
            .builder()
            .claims(claims)
            .make(false)?;
        self.manager.encode(&payload)
    }

    /// Decodes the current token, checking the blacklist.
    ///
    /// # Errors
    ///
    /// Returns `TokenRequired` without a token, or any decode error.
    pub async fn check_or_fail(&self) -> AuthResult<Payload> {
        let token = self.require_token()?;
        self.manager.decode(token, true).await
    }

    /// Alias of [`check_or_fail`](Self::check_or_fail).
    ///
    /// # Errors
    ///
    /// See [`check_or_fail`](Self::check_or_fail).
    pub async fn payload(&self) -> AuthResult<Payload> {
        self.check_or_fail().await
    }

    /// Returns `true` if the current token decodes and validates.
    pub async fn check(&self) -> bool {
        match self.check_or_fail().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Token check failed");
                false
            }
        }
    }

    /// Returns a claim of the current token.
    ///
    /// # Errors
    ///
    /// See [`check_or_fail`](Self::check_or_fail).
    pub async fn get_claim(&self, name: &str) -> AuthResult<Option<Value>> {
        Ok(self.check_or_fail().await?.get(name).cloned())
    }

    /// Refreshes the current token and holds on to the new one.
    ///
    /// # Errors
    ///
    /// Returns `TokenRequired` without a token, or any refresh error.
    pub async fn refresh(&mut self, options: RefreshOptions) -> AuthResult<Token> {
        let token = self.require_token()?;
        let refreshed = self
            .manager
            .refresh(token, options, self.custom_claims.clone())
            .await?;
        self.token = Some(refreshed.clone());
        Ok(refreshed)
    }

    /// Blacklists the current token.
    ///
    /// # Errors
    ///
    /// Returns `TokenRequired` without a token, or any invalidation error.
    pub async fn invalidate(&self, force_forever: bool) -> AuthResult<()> {
        let token = self.require_token()?;
        self.manager.invalidate(token, force_forever).await?;
        Ok(())
    }

    /// Returns `true` if the current token was issued for `subject`'s model,
    /// or carries no model lock at all.
    ///
    /// # Errors
    ///
    /// See [`check_or_fail`](Self::check_or_fail).
    pub async fn check_subject_model<S: JwtSubject + ?Sized>(&self, subject: &S) -> AuthResult<bool> {
        let payload = self.check_or_fail().await?;
        let matches = match payload.get(names::SUBJECT_MODEL) {
            None => true,
            Some(prv) => {
                prv.as_str() == Some(subject_model_hash(&subject.jwt_subject_model()).as_str())
            }
        };
        Ok(matches)
    }

    /// Returns the manager.
    #[must_use]
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    fn require_token(&self) -> AuthResult<&Token> {
        self.token.as_ref().ok_or(AuthError::TokenRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::Blacklist;
    use crate::claims::ClaimFactory;
    use crate::clock::FixedClock;
    use crate::payload::PayloadFactory;
    use crate::provider::{JsonWebTokenProvider, SigningAlgorithm};
    use crate::storage::InMemoryStorage;
    use crate::validation::PayloadValidator;
    use serde_json::json;
    use time::Duration;

    const NOW: i64 = 1_700_000_000;

    struct User {
        id: u64,
    }

    impl JwtSubject for User {
        fn jwt_identifier(&self) -> Value {
            self.id.into()
        }

        fn jwt_custom_claims(&self) -> Map<String, Value> {
            let mut claims = Map::new();
            claims.insert("role".into(), json!("user"));
            claims
        }
    }

    struct Admin;

    impl JwtSubject for Admin {
        fn jwt_identifier(&self) -> Value {
            json!(1)
        }

        fn jwt_subject_model(&self) -> String {
            "app::Admin".to_string()
        }
    }

    fn auth() -> (Arc<FixedClock>, JwtAuth) {
        let clock = Arc::new(FixedClock::at(NOW));
        let provider =
            JsonWebTokenProvider::from_secret(SigningAlgorithm::HS256, b"secret").unwrap();
        let payload_factory = PayloadFactory::new(
            ClaimFactory::new(clock.clone()).with_issuer("http://example.com"),
            PayloadValidator::new(clock.clone()),
        );
        let storage = Arc::new(InMemoryStorage::with_clock(clock.clone()));
        let blacklist = Blacklist::new(storage, clock.clone());
        let manager = Manager::new(Arc::new(provider), payload_factory, blacklist);
        (clock, JwtAuth::new(Arc::new(manager)))
    }

    #[tokio::test]
    async fn test_from_subject_and_check() {
        let (_, mut auth) = auth();
        let token = auth.from_subject(&User { id: 7 }).unwrap();
        auth.set_token(token.as_str()).unwrap();

        let payload = auth.check_or_fail().await.unwrap();
        assert_eq!(payload.get("sub"), Some(&json!(7)));
        assert_eq!(payload.get("role"), Some(&json!("user")));
        assert_eq!(
            payload.get("prv").and_then(Value::as_str),
            Some(subject_model_hash(std::any::type_name::<User>()).as_str())
        );
        assert!(auth.check().await);
        assert_eq!(auth.get_claim("sub").await.unwrap(), Some(json!(7)));
    }

    #[tokio::test]
    async fn test_inline_claims_override_subject_claims() {
        let (_, mut auth) = auth();
        let mut claims = Map::new();
        claims.insert("role".into(), json!("admin"));
        auth.claims(claims);

        let token = auth.from_subject(&User { id: 7 }).unwrap();
        auth.set_token(token.as_str()).unwrap();
        assert_eq!(auth.get_claim("role").await.unwrap(), Some(json!("admin")));
    }

    #[tokio::test]
    async fn test_subject_model_lock() {
        let (_, mut auth) = auth();
        let token = auth.from_subject(&Admin).unwrap();
        auth.set_token(token.as_str()).unwrap();

        assert!(auth.check_subject_model(&Admin).await.unwrap());
        assert!(!auth.check_subject_model(&User { id: 1 }).await.unwrap());

        // Without a lock every model matches
        auth.lock_subject(false);
        let token = auth.from_subject(&Admin).unwrap();
        auth.set_token(token.as_str()).unwrap();
        assert!(!auth.check_or_fail().await.unwrap().has_key("prv"));
        assert!(auth.check_subject_model(&User { id: 1 }).await.unwrap());
    }

    #[tokio::test]
    async fn test_token_required() {
        let (_, mut auth) = auth();
        assert!(matches!(
            auth.check_or_fail().await,
            Err(AuthError::TokenRequired)
        ));
        assert!(!auth.check().await);
        assert!(matches!(
            auth.refresh(RefreshOptions::default()).await,
            Err(AuthError::TokenRequired)
        ));
        assert!(matches!(
            auth.invalidate(false).await,
            Err(AuthError::TokenRequired)
        ));

        let token = auth.from_subject(&User { id: 1 }).unwrap();
        auth.set_token(token.as_str()).unwrap();
        auth.unset_token();
        assert!(auth.token().is_none());
    }

    #[tokio::test]
    async fn test_set_token_rejects_malformed() {
        let (_, mut auth) = auth();
        assert!(matches!(
            auth.set_token("foo.bar"),
            Err(AuthError::TokenMalformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_replaces_token() {
        let (clock, mut auth) = auth();
        let token = auth.from_subject(&User { id: 7 }).unwrap();
        auth.set_token(token.as_str()).unwrap();

        clock.advance(Duration::minutes(90));
        assert!(!auth.check().await);

        let refreshed = auth.refresh(RefreshOptions::default()).await.unwrap();
        assert_eq!(auth.token(), Some(&refreshed));
        assert!(auth.check().await);
        assert_eq!(auth.get_claim("role").await.unwrap(), Some(json!("user")));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (_, mut auth) = auth();
        let token = auth.from_subject(&User { id: 7 }).unwrap();
        auth.set_token(token.as_str()).unwrap();

        auth.invalidate(false).await.unwrap();
        assert!(matches!(
            auth.check_or_fail().await,
            Err(AuthError::TokenBlacklisted)
        ));
    }
}

//! # tokenward
//!
//! Signed identity tokens for stateless authentication.
//!
//! This crate provides:
//! - Typed claims with per-claim validation rules
//! - Immutable payloads assembled from defaults and custom claims
//! - Encoding and decoding through a pluggable signing provider
//! - Token refresh within a bounded window
//! - Revocation through a blacklist with a grace period
//!
//! ## Overview
//!
//! A [`Manager`] ties the pieces together: a [`PayloadFactory`] builds and
//! validates payloads, a [`JwtProvider`] signs and verifies them, and a
//! [`Blacklist`] records revoked tokens in a [`BlacklistStorage`] backend.
//! [`JwtAuth`] is the per-request facade that issues tokens for subjects and
//! checks incoming ones.
//!
//! ## Modules
//!
//! - [`claims`] - Claim types, the claim collection and the claim factory
//! - [`validation`] - Payload completeness and claim rules
//! - [`payload`] - Immutable payloads and the payload factory
//! - [`provider`] - Signing providers
//! - [`token`] - Structural token wrapper
//! - [`blacklist`] - Token revocation
//! - [`storage`] - Blacklist storage backends
//! - [`manager`] - Encode, decode, refresh and invalidate
//! - [`auth`] - Subject-facing facade
//! - [`config`] - Configuration and wiring
//! - [`clock`] - Time sources

pub mod auth;
pub mod blacklist;
pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod payload;
pub mod provider;
pub mod storage;
pub mod token;
pub mod validation;

pub use auth::{JwtAuth, JwtSubject};
pub use blacklist::{Blacklist, BlacklistEntry};
pub use claims::{Claim, ClaimCollection, ClaimFactory, ClaimKind, ClaimRegistry};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use config::{ConfigError, KeysConfig, TokenwardConfig};
pub use error::{AuthError, ErrorCategory, ExpiryKind};
pub use manager::{Manager, RefreshOptions};
pub use payload::{Payload, PayloadBuilder, PayloadFactory};
pub use provider::{JsonWebTokenProvider, JwtProvider, SigningAlgorithm};
pub use storage::{BlacklistStorage, InMemoryStorage};
pub use token::Token;
pub use validation::{PayloadValidator, ValidationMode};

/// Type alias for token results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokenward::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::auth::{JwtAuth, JwtSubject};
    pub use crate::blacklist::Blacklist;
    pub use crate::clock::{Clock, SharedClock};
    pub use crate::config::TokenwardConfig;
    pub use crate::error::AuthError;
    pub use crate::manager::{Manager, RefreshOptions};
    pub use crate::payload::Payload;
    pub use crate::storage::{BlacklistStorage, InMemoryStorage};
    pub use crate::token::Token;
}

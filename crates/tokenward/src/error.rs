//! Token and claim error types.
//!
//! Every failure the core can produce is a variant of [`AuthError`]. Callers
//! are expected to map these to their own responses (usually HTTP 401 for the
//! token-related kinds).

use std::fmt;

/// Why a token is considered expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpiryKind {
    /// The `exp` claim lies in the past.
    Lifetime,
    /// The refresh window (`iat` + refresh TTL) has passed.
    RefreshWindow,
}

impl fmt::Display for ExpiryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifetime => write!(f, "Token has expired"),
            Self::RefreshWindow => write!(f, "Token has expired and can no longer be refreshed"),
        }
    }
}

/// Errors that can occur while building, validating, or revoking tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A single claim's value violates the rule of its type.
    #[error("Invalid value provided for claim [{claim}]")]
    InvalidClaim {
        /// Name of the offending claim.
        claim: String,
    },

    /// The payload lacks at least one of the required claims.
    #[error("JWT payload does not contain the required claims")]
    MissingRequiredClaims,

    /// The token is expired, or is past its refresh window.
    #[error("{kind}")]
    TokenExpired {
        /// Which deadline was missed.
        kind: ExpiryKind,
    },

    /// A timestamp claim places the token in the future.
    #[error("{message}")]
    TokenNotYetValid {
        /// Description naming the claim.
        message: String,
    },

    /// The token has been revoked.
    #[error("The token has been blacklisted")]
    TokenBlacklisted,

    /// The token string is not three dot-separated segments.
    #[error("{message}")]
    TokenMalformed {
        /// Description of the structural problem.
        message: String,
    },

    /// The signing provider rejected the token.
    #[error("Could not decode token: {message}")]
    TokenInvalidSignature {
        /// Description from the signing provider.
        message: String,
    },

    /// An operation needed a token but none was set.
    #[error("A token is required")]
    TokenRequired,

    /// The signing provider failed to produce a token.
    #[error("Could not create token: {message}")]
    Signing {
        /// Description from the signing provider.
        message: String,
    },

    /// The component is configured in a way that forbids the operation.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// A write was attempted on a constructed payload.
    #[error("The payload is immutable")]
    PayloadImmutable,

    /// The blacklist backing store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidClaim` error.
    #[must_use]
    pub fn invalid_claim(claim: impl Into<String>) -> Self {
        Self::InvalidClaim {
            claim: claim.into(),
        }
    }

    /// Creates a `TokenExpired` error for a past `exp`.
    #[must_use]
    pub fn token_expired() -> Self {
        Self::TokenExpired {
            kind: ExpiryKind::Lifetime,
        }
    }

    /// Creates a `TokenExpired` error for a closed refresh window.
    #[must_use]
    pub fn refresh_expired() -> Self {
        Self::TokenExpired {
            kind: ExpiryKind::RefreshWindow,
        }
    }

    /// Creates a new `TokenNotYetValid` error.
    #[must_use]
    pub fn not_yet_valid(message: impl Into<String>) -> Self {
        Self::TokenNotYetValid {
            message: message.into(),
        }
    }

    /// Creates a new `TokenMalformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::TokenMalformed {
            message: message.into(),
        }
    }

    /// Creates a new `TokenInvalidSignature` error.
    #[must_use]
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::TokenInvalidSignature {
            message: message.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns `true` if the token itself (not the server) is at fault.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidClaim { .. }
                | Self::MissingRequiredClaims
                | Self::TokenExpired { .. }
                | Self::TokenNotYetValid { .. }
                | Self::TokenBlacklisted
                | Self::TokenMalformed { .. }
                | Self::TokenInvalidSignature { .. }
                | Self::TokenRequired
        )
    }

    /// Returns `true` if this is a server-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Signing { .. } | Self::Configuration { .. } | Self::Storage { .. }
        )
    }

    /// Returns `true` if the token expired but only its refresh window is closed.
    #[must_use]
    pub fn is_refresh_expired(&self) -> bool {
        matches!(
            self,
            Self::TokenExpired {
                kind: ExpiryKind::RefreshWindow
            }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClaim { .. } | Self::MissingRequiredClaims => ErrorCategory::Claims,
            Self::TokenExpired { .. } | Self::TokenNotYetValid { .. } => ErrorCategory::Temporal,
            Self::TokenBlacklisted => ErrorCategory::Revocation,
            Self::TokenMalformed { .. }
            | Self::TokenInvalidSignature { .. }
            | Self::TokenRequired => ErrorCategory::Token,
            Self::PayloadImmutable => ErrorCategory::Usage,
            Self::Signing { .. } => ErrorCategory::Internal,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the HTTP status code callers typically answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        if self.is_token_error() {
            401
        } else {
            500
        }
    }
}

/// Categories of token errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Claim values or claim completeness.
    Claims,
    /// Expiry, not-before, and refresh-window checks.
    Temporal,
    /// Blacklisted tokens.
    Revocation,
    /// Token structure and signature.
    Token,
    /// API misuse such as writing to a payload.
    Usage,
    /// Configuration errors.
    Configuration,
    /// Backing store errors.
    Infrastructure,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claims => write!(f, "claims"),
            Self::Temporal => write!(f, "temporal"),
            Self::Revocation => write!(f, "revocation"),
            Self::Token => write!(f, "token"),
            Self::Usage => write!(f, "usage"),
            Self::Configuration => write!(f, "configuration"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

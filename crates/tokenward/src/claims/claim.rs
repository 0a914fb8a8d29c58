//! A single typed claim.

use std::fmt;

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::AuthResult;
use crate::error::AuthError;

/// Registered claim names.
pub mod names {
    /// Audience.
    pub const AUDIENCE: &str = "aud";
    /// Expiration time.
    pub const EXPIRATION: &str = "exp";
    /// Issued at.
    pub const ISSUED_AT: &str = "iat";
    /// Issuer.
    pub const ISSUER: &str = "iss";
    /// JWT ID.
    pub const JWT_ID: &str = "jti";
    /// Not before.
    pub const NOT_BEFORE: &str = "nbf";
    /// Subject.
    pub const SUBJECT: &str = "sub";
    /// Subject model lock.
    pub const SUBJECT_MODEL: &str = "prv";
}

/// The rule set a claim is validated with.
///
/// The [`ClaimRegistry`](super::ClaimRegistry) maps claim names to kinds; the
/// kind decides what a value must look like at construction and which
/// temporal rules apply during payload validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimKind {
    /// `aud`: any value.
    Audience,
    /// `exp`: numeric; must not be in the past.
    Expiration,
    /// `iat`: numeric, not in the future; bounds the refresh window.
    IssuedAt,
    /// `iss`: any value.
    Issuer,
    /// `jti`: any value.
    JwtId,
    /// `nbf`: numeric; must not be in the future.
    NotBefore,
    /// `sub`: any value.
    Subject,
    /// A numeric timestamp without temporal rules.
    Timestamp,
    /// Anything else.
    Custom,
}

impl ClaimKind {
    /// Returns `true` for kinds whose value is a unix timestamp.
    #[must_use]
    pub fn is_datetime(self) -> bool {
        matches!(
            self,
            Self::Expiration | Self::IssuedAt | Self::NotBefore | Self::Timestamp
        )
    }

    /// Returns the kind's name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audience => "audience",
            Self::Expiration => "expiration",
            Self::IssuedAt => "issued_at",
            Self::Issuer => "issuer",
            Self::JwtId => "jwt_id",
            Self::NotBefore => "not_before",
            Self::Subject => "subject",
            Self::Timestamp => "timestamp",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts datetimes and relative durations into timestamp claim values.
pub trait IntoTimestamp {
    /// Resolves `self` against `now` into a unix timestamp.
    fn into_timestamp(self, now: OffsetDateTime) -> i64;
}

impl IntoTimestamp for OffsetDateTime {
    fn into_timestamp(self, _now: OffsetDateTime) -> i64 {
        self.unix_timestamp()
    }
}

impl IntoTimestamp for Duration {
    fn into_timestamp(self, now: OffsetDateTime) -> i64 {
        now.saturating_add(self).unix_timestamp()
    }
}

impl IntoTimestamp for i64 {
    fn into_timestamp(self, _now: OffsetDateTime) -> i64 {
        self
    }
}

/// A named claim whose value satisfied its kind's rule when it was set.
#[derive(Debug, Clone)]
pub struct Claim {
    name: String,
    value: Value,
    kind: ClaimKind,
    leeway: i64,
}

impl Claim {
    /// Creates a claim, validating `value` against the kind's creation rule.
    ///
    /// `now` is only consulted by kinds that forbid future values (`iat`).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidClaim`] if the value is not acceptable.
    pub fn new(
        kind: ClaimKind,
        name: impl Into<String>,
        value: impl Into<Value>,
        leeway: i64,
        now: OffsetDateTime,
    ) -> AuthResult<Self> {
        let mut claim = Self {
            name: name.into(),
            value: Value::Null,
            kind,
            leeway,
        };
        claim.set_value(value, now)?;
        Ok(claim)
    }

    /// Creates an untyped claim. Custom claims accept any value.
    #[must_use]
    pub fn custom(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: ClaimKind::Custom,
            leeway: 0,
        }
    }

    /// Creates a datetime claim of `kind` from a datetime, a duration
    /// relative to `now`, or a raw timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidClaim`] if the resolved timestamp violates
    /// the kind's creation rule.
    pub fn datetime(
        kind: ClaimKind,
        name: impl Into<String>,
        at: impl IntoTimestamp,
        leeway: i64,
        now: OffsetDateTime,
    ) -> AuthResult<Self> {
        Self::new(kind, name, at.into_timestamp(now), leeway, now)
    }

    /// Replaces the value, re-running the creation rule.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidClaim`] and leaves the claim unchanged if
    /// the value is not acceptable.
    pub fn set_value(&mut self, value: impl Into<Value>, now: OffsetDateTime) -> AuthResult<()> {
        let value = value.into();
        self.validate_create(&value, now.unix_timestamp())?;
        self.value = value;
        Ok(())
    }

    /// Returns the claim name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the claim value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the claim kind.
    #[must_use]
    pub fn kind(&self) -> ClaimKind {
        self.kind
    }

    /// Returns the permitted clock skew in seconds.
    #[must_use]
    pub fn leeway(&self) -> i64 {
        self.leeway
    }

    /// Returns a copy with a different leeway.
    #[must_use]
    pub fn with_leeway(mut self, leeway: i64) -> Self {
        self.leeway = leeway;
        self
    }

    /// Returns the value as a unix timestamp for datetime kinds.
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        if !self.kind.is_datetime() {
            return None;
        }
        as_timestamp(&self.value)
    }

    /// Compares the stored value with `value`.
    ///
    /// Strict matching is type-sensitive; loose matching treats numbers and
    /// numeric strings with the same magnitude as equal.
    #[must_use]
    pub fn matches(&self, value: &Value, strict: bool) -> bool {
        if strict {
            &self.value == value
        } else {
            loose_eq(&self.value, value)
        }
    }

    /// Checks the claim during normal payload validation.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` for a past `exp`, or `TokenNotYetValid` for a
    /// future `nbf`/`iat`.
    pub fn validate_payload(&self, now: i64) -> AuthResult<()> {
        match self.kind {
            ClaimKind::Expiration => {
                if self.is_past(now) {
                    return Err(AuthError::token_expired());
                }
            }
            ClaimKind::NotBefore => {
                if self.is_future(now) {
                    return Err(AuthError::not_yet_valid(
                        "Not Before (nbf) timestamp cannot be in the future",
                    ));
                }
            }
            ClaimKind::IssuedAt => {
                if self.is_future(now) {
                    return Err(AuthError::not_yet_valid(
                        "Issued At (iat) timestamp cannot be in the future",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Checks the claim during the refresh flow.
    ///
    /// The expiration rule is skipped (an expired token may be refreshed);
    /// `iat` additionally bounds the refresh window when `refresh_ttl`
    /// (minutes) is set.
    ///
    /// # Errors
    ///
    /// Returns `TokenExpired` once `now` is past `iat + refresh_ttl`, or
    /// `TokenNotYetValid` for a future `nbf`/`iat`.
    pub fn validate_refresh(&self, now: i64, refresh_ttl: Option<i64>) -> AuthResult<()> {
        if self.kind == ClaimKind::Expiration {
            return Ok(());
        }
        self.validate_payload(now)?;

        if let (ClaimKind::IssuedAt, Some(ttl)) = (self.kind, refresh_ttl)
            && let Some(iat) = self.timestamp()
            && iat
                .saturating_add(ttl.saturating_mul(60))
                .saturating_add(self.leeway)
                < now
        {
            return Err(AuthError::refresh_expired());
        }
        Ok(())
    }

    fn validate_create(&self, value: &Value, now: i64) -> AuthResult<()> {
        if !self.kind.is_datetime() {
            return Ok(());
        }
        let Some(ts) = as_timestamp(value) else {
            return Err(AuthError::invalid_claim(&self.name));
        };
        if self.kind == ClaimKind::IssuedAt && ts.saturating_sub(self.leeway) > now {
            return Err(AuthError::invalid_claim(&self.name));
        }
        Ok(())
    }

    fn is_past(&self, now: i64) -> bool {
        self.timestamp()
            .is_some_and(|ts| ts.saturating_add(self.leeway) < now)
    }

    fn is_future(&self, now: i64) -> bool {
        self.timestamp()
            .is_some_and(|ts| ts.saturating_sub(self.leeway) > now)
    }
}

impl PartialEq for Claim {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// Reads a JSON number as a whole-second timestamp.
pub(crate) fn as_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => s
            .trim()
            .parse::<f64>()
            .is_ok_and(|parsed| Some(parsed) == n.as_f64()),
        (Value::Bool(flag), other) | (other, Value::Bool(flag)) => *flag == truthy(other),
        _ => a == b,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

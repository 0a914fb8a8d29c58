//! Structurally checked token strings.

use std::fmt;
use std::str::FromStr;

use crate::AuthResult;
use crate::error::AuthError;

/// A token string made of three non-empty, dot-separated segments.
///
/// Only the shape is checked here; the signature is verified by the
/// [`JwtProvider`](crate::provider::JwtProvider) on decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    value: String,
}

impl Token {
    /// Wraps `value` after checking its structure.
    ///
    /// # Errors
    ///
    /// Returns `TokenMalformed` with `"Wrong number of segments"` unless
    /// there are exactly three segments, or `"Malformed token"` if a segment
    /// is empty or contains whitespace.
    pub fn new(value: impl Into<String>) -> AuthResult<Self> {
        let value = value.into();
        let segments: Vec<&str> = value.split('.').collect();
        if segments.len() != 3 {
            return Err(AuthError::malformed("Wrong number of segments"));
        }
        if segments
            .iter()
            .any(|s| s.is_empty() || s.chars().any(char::is_whitespace))
        {
            return Err(AuthError::malformed("Malformed token"));
        }
        Ok(Self { value })
    }

    /// Returns the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the token string, consuming the token.
    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }
}

impl FromStr for Token {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Token {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_token() {
        let token = Token::new("foo.bar.baz").unwrap();
        assert_eq!(token.as_str(), "foo.bar.baz");
        assert_eq!(token.to_string(), "foo.bar.baz");
        assert_eq!("a.b.c".parse::<Token>().unwrap().as_ref(), "a.b.c");
    }

    #[test]
    fn test_wrong_number_of_segments() {
        for value in ["a.b", "a.b.c.d", "abc", ""] {
            let err = Token::new(value).unwrap_err();
            assert_eq!(err.to_string(), "Wrong number of segments", "{value:?}");
        }
    }

    #[test]
    fn test_malformed_segments() {
        for value in ["a.b.", ".b.", "a..c", " a . b . c ", "a.b .c", "a.b.c\n"] {
            let err = Token::new(value).unwrap_err();
            assert!(
                matches!(err, AuthError::TokenMalformed { ref message } if message == "Malformed token"),
                "{value:?}"
            );
        }
    }
}

//! [`JwtProvider`] backed by the `jsonwebtoken` crate.
//!
//! ## Supported Algorithms
//!
//! - **HS256/HS384/HS512**: HMAC with a shared secret
//! - **RS256/RS384/RS512**: RSA, PEM keys
//! - **ES256/ES384**: ECDSA, PEM keys
//!
//! Keys for RS* and ES384 can also be generated in-process, which is handy
//! for development and tests.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use p384::SecretKey as EcSecretKey;
use p384::ecdsa::SigningKey as EcSigningKey;
use p384::pkcs8::EncodePrivateKey as EcEncodePrivateKey;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use serde_json::{Map, Value};

use super::JwtProvider;
use crate::AuthResult;
use crate::error::AuthError;

// ============================================================================
// Error Mapping
// ============================================================================

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                Self::configuration(format!("Invalid key: {err}"))
            }
            _ => Self::invalid_signature(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// RSA with SHA-512.
    RS512,
    /// ECDSA with P-256.
    ES256,
    /// ECDSA with P-384.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::RS512 => Algorithm::RS512,
            Self::ES256 => Algorithm::ES256,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an HMAC (shared secret) algorithm.
    #[must_use]
    pub fn is_hmac(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384 | Self::RS512)
    }

    /// Returns `true` if this is an EC-based algorithm.
    #[must_use]
    pub fn is_ec(&self) -> bool {
        matches!(self, Self::ES256 | Self::ES384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            other => Err(AuthError::configuration(format!(
                "The given algorithm could not be found: {other}"
            ))),
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Signs and verifies tokens with `jsonwebtoken`.
///
/// Only the signature (and algorithm) is verified on decode. Temporal claims
/// are left to the [`PayloadValidator`](crate::PayloadValidator).
pub struct JsonWebTokenProvider {
    algorithm: SigningAlgorithm,
    kid: Option<String>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JsonWebTokenProvider {
    /// Creates an HMAC provider from a shared secret.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `algorithm` is not HMAC-based or the
    /// secret is empty.
    pub fn from_secret(algorithm: SigningAlgorithm, secret: &[u8]) -> AuthResult<Self> {
        if !algorithm.is_hmac() {
            return Err(AuthError::configuration(format!(
                "Algorithm {algorithm} requires a key pair, not a secret"
            )));
        }
        if secret.is_empty() {
            return Err(AuthError::configuration("Secret is not set"));
        }

        Ok(Self {
            algorithm,
            kid: None,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Creates an RSA or EC provider from PEM-encoded keys.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `algorithm` is HMAC-based or a key
    /// cannot be parsed.
    pub fn from_pem(
        algorithm: SigningAlgorithm,
        private_pem: &str,
        public_pem: &str,
    ) -> AuthResult<Self> {
        let (encoding_key, decoding_key) = if algorithm.is_rsa() {
            (
                EncodingKey::from_rsa_pem(private_pem.as_bytes())?,
                DecodingKey::from_rsa_pem(public_pem.as_bytes())?,
            )
        } else if algorithm.is_ec() {
            (
                EncodingKey::from_ec_pem(private_pem.as_bytes())?,
                DecodingKey::from_ec_pem(public_pem.as_bytes())?,
            )
        } else {
            return Err(AuthError::configuration(format!(
                "Algorithm {algorithm} requires a secret, not a key pair"
            )));
        };

        Ok(Self {
            algorithm,
            kid: None,
            encoding_key,
            decoding_key,
        })
    }

    /// Generates a fresh 2048-bit RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `algorithm` is not RSA-based or key
    /// generation fails.
    pub fn generate_rsa(algorithm: SigningAlgorithm) -> AuthResult<Self> {
        if !algorithm.is_rsa() {
            return Err(AuthError::configuration(format!(
                "Algorithm {algorithm} is not RSA-based"
            )));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).map_err(key_generation)?;
        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(key_generation)?;
        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(key_generation)?;

        Ok(Self::from_pem(algorithm, &private_pem, &public_pem)?.with_random_kid())
    }

    /// Generates a fresh P-384 key pair for ES384.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if key generation fails.
    pub fn generate_ec() -> AuthResult<Self> {
        let secret_key = EcSecretKey::random(&mut OsRng);
        let point = EcSigningKey::from(&secret_key)
            .verifying_key()
            .to_encoded_point(false);
        let x = point
            .x()
            .ok_or_else(|| AuthError::configuration("Missing x coordinate"))?;
        let y = point
            .y()
            .ok_or_else(|| AuthError::configuration("Missing y coordinate"))?;

        // jsonwebtoken wants PKCS8 for signing and raw coordinates for verifying
        let private_pem = secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(key_generation)?;
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())?;
        let decoding_key = DecodingKey::from_ec_components(
            &URL_SAFE_NO_PAD.encode(x.as_slice()),
            &URL_SAFE_NO_PAD.encode(y.as_slice()),
        )?;

        Ok(Self {
            algorithm: SigningAlgorithm::ES384,
            kid: None,
            encoding_key,
            decoding_key,
        }
        .with_random_kid())
    }

    /// Sets the key ID written to the token header.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    fn with_random_kid(self) -> Self {
        self.with_kid(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        validation
    }
}

impl JwtProvider for JsonWebTokenProvider {
    fn encode(&self, claims: &Map<String, Value>) -> AuthResult<String> {
        let mut header = Header::new(self.algorithm.to_jwt_algorithm());
        header.kid = self.kid.clone();

        encode(&header, claims, &self.encoding_key).map_err(|e| AuthError::signing(e.to_string()))
    }

    fn decode(&self, token: &str) -> AuthResult<Map<String, Value>> {
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation())?;
        Ok(data.claims)
    }
}

impl fmt::Debug for JsonWebTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonWebTokenProvider")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

fn key_generation(err: impl fmt::Display) -> AuthError {
    AuthError::configuration(format!("Key generation failed: {err}"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims() -> Map<String, Value> {
        let Value::Object(map) = json!({
            "sub": 1,
            "iss": "http://example.com",
            "exp": 1_000,
            "iat": 900,
            "jti": "foo",
            "nested": {"roles": ["admin"]},
        }) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn test_hs256_encode_decode() {
        let provider = JsonWebTokenProvider::from_secret(SigningAlgorithm::HS256, b"secret").unwrap();
        let token = provider.encode(&claims()).unwrap();
        assert_eq!(token.split('.').count(), 3);

        // Long expired, but the provider only checks the signature
        let decoded = provider.decode(&token).unwrap();
        assert_eq!(decoded, claims());
    }

    #[test]
    fn test_rs256_encode_decode() {
        let provider = JsonWebTokenProvider::generate_rsa(SigningAlgorithm::RS256).unwrap();
        assert!(provider.kid().is_some());
        let token = provider.encode(&claims()).unwrap();
        assert_eq!(provider.decode(&token).unwrap(), claims());
    }

    #[test]
    fn test_es384_encode_decode() {
        let provider = JsonWebTokenProvider::generate_ec().unwrap();
        assert_eq!(provider.algorithm(), SigningAlgorithm::ES384);
        let token = provider.encode(&claims()).unwrap();
        assert_eq!(provider.decode(&token).unwrap(), claims());
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let signer = JsonWebTokenProvider::from_secret(SigningAlgorithm::HS256, b"secret").unwrap();
        let verifier = JsonWebTokenProvider::from_secret(SigningAlgorithm::HS256, b"other").unwrap();

        let token = signer.encode(&claims()).unwrap();
        let err = verifier.decode(&token).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalidSignature { .. }));
        assert!(err.to_string().starts_with("Could not decode token:"));
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let hs256 = JsonWebTokenProvider::from_secret(SigningAlgorithm::HS256, b"secret").unwrap();
        let hs512 = JsonWebTokenProvider::from_secret(SigningAlgorithm::HS512, b"secret").unwrap();

        let token = hs256.encode(&claims()).unwrap();
        assert!(hs512.decode(&token).is_err());
    }

    #[test]
    fn test_constructor_algorithm_checks() {
        assert!(JsonWebTokenProvider::from_secret(SigningAlgorithm::RS256, b"secret").is_err());
        assert!(JsonWebTokenProvider::from_secret(SigningAlgorithm::HS256, b"").is_err());
        assert!(JsonWebTokenProvider::from_pem(SigningAlgorithm::HS256, "", "").is_err());
        assert!(JsonWebTokenProvider::generate_rsa(SigningAlgorithm::ES384).is_err());
        assert!(matches!(
            JsonWebTokenProvider::from_pem(SigningAlgorithm::RS256, "not a key", "not a key"),
            Err(AuthError::Configuration { .. })
        ));
    }

    #[test]
    fn test_signing_algorithm_parsing() {
        assert_eq!("hs256".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::HS256);
        assert_eq!("ES384".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::ES384);
        assert!("none".parse::<SigningAlgorithm>().is_err());

        assert!(SigningAlgorithm::HS512.is_hmac());
        assert!(SigningAlgorithm::RS512.is_rsa());
        assert!(SigningAlgorithm::ES256.is_ec());
        assert_eq!(SigningAlgorithm::RS384.to_string(), "RS384");
    }
}

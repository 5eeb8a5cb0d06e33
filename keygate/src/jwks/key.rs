//! Published key entries and the verifiable keys built from them.
//!
//! # Pre-conditions
//! - `n` and `e` are base64url big-endian unsigned integers.
//!
//! # Post-conditions
//! - A `VerifiablePublicKey` always holds a structurally valid RSA public key.
//!
//! # Invariants
//! - Keys are immutable once constructed.
//! - The integer form and the prepared decoding key come from the same bytes.

use jsonwebtoken::DecodingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::Deserialize;

use super::base64url::{Base64UrlError, decode_base64url};
use crate::auth::SigningAlgorithm;

/// One entry of a key-publication document, as published.
///
/// Members other than these (`x5c`, `x5t`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyEntry {
    /// Key identifier.
    pub kid: String,
    /// Base64url modulus.
    #[serde(default)]
    pub n: Option<String>,
    /// Base64url public exponent.
    #[serde(default)]
    pub e: Option<String>,
    /// Key type, `"RSA"` when present.
    #[serde(default)]
    pub kty: Option<String>,
    /// Intended use, `"sig"` when present.
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    /// Algorithm the key is bound to, if published.
    #[serde(default)]
    pub alg: Option<String>,
}

/// Error for a single key entry that cannot become a verifiable key.
///
/// These never abort a keyset fetch; the entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEntryError {
    /// The entry is not a JSON object with a string `kid`.
    Shape(String),
    /// A required component is absent.
    MissingField(&'static str),
    /// A component is not valid base64url.
    InvalidBase64 {
        /// Component name (`n` or `e`).
        field: &'static str,
        /// Underlying decode error.
        source: Base64UrlError,
    },
    /// A component decodes to zero.
    NotPositive(&'static str),
    /// The entry's `kty` is not `RSA`.
    UnsupportedKeyType(String),
    /// The entry's `use` is not `sig`.
    NotSigningKey(String),
    /// The entry's `alg` is not a supported RSA signature algorithm.
    UnsupportedAlgorithm(String),
    /// The components do not form a valid RSA public key.
    InvalidKey(String),
}

impl std::fmt::Display for KeyEntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shape(reason) => write!(f, "malformed key entry: {reason}"),
            Self::MissingField(field) => write!(f, "missing '{field}' member"),
            Self::InvalidBase64 { field, source } => write!(f, "'{field}' member: {source}"),
            Self::NotPositive(field) => write!(f, "'{field}' member is not a positive integer"),
            Self::UnsupportedKeyType(kty) => write!(f, "unsupported key type '{kty}'"),
            Self::NotSigningKey(key_use) => write!(f, "key use '{key_use}' is not 'sig'"),
            Self::UnsupportedAlgorithm(alg) => write!(f, "unsupported key algorithm '{alg}'"),
            Self::InvalidKey(reason) => write!(f, "invalid RSA public key: {reason}"),
        }
    }
}

impl std::error::Error for KeyEntryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidBase64 { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// An RSA public key ready for signature verification.
#[derive(Clone)]
pub struct VerifiablePublicKey {
    kid: String,
    public_key: RsaPublicKey,
    algorithm: Option<SigningAlgorithm>,
    decoding_key: DecodingKey,
}

impl VerifiablePublicKey {
    /// Builds a key from a published entry.
    ///
    /// # Errors
    /// Returns `KeyEntryError` if the entry is not a signing RSA key or its
    /// components do not decode to a valid public key.
    pub fn from_entry(entry: &KeyEntry) -> Result<Self, KeyEntryError> {
        if let Some(kty) = entry.kty.as_deref().filter(|kty| *kty != "RSA") {
            return Err(KeyEntryError::UnsupportedKeyType(kty.to_string()));
        }
        if let Some(key_use) = entry.key_use.as_deref().filter(|u| *u != "sig") {
            return Err(KeyEntryError::NotSigningKey(key_use.to_string()));
        }
        let algorithm = match entry.alg.as_deref() {
            None => None,
            Some(name) => Some(
                SigningAlgorithm::from_name(name)
                    .ok_or_else(|| KeyEntryError::UnsupportedAlgorithm(name.to_string()))?,
            ),
        };

        let modulus = decode_component("n", entry.n.as_deref())?;
        let exponent = decode_component("e", entry.e.as_deref())?;

        Self::from_components(&entry.kid, &modulus, &exponent, algorithm)
    }

    /// Builds a key from big-endian modulus and exponent bytes.
    ///
    /// # Errors
    /// Returns `KeyEntryError::NotPositive` for a zero component and
    /// `KeyEntryError::InvalidKey` when RSA validation fails.
    pub fn from_components(
        kid: &str,
        modulus: &[u8],
        exponent: &[u8],
        algorithm: Option<SigningAlgorithm>,
    ) -> Result<Self, KeyEntryError> {
        if modulus.iter().all(|&b| b == 0) {
            return Err(KeyEntryError::NotPositive("n"));
        }
        if exponent.iter().all(|&b| b == 0) {
            return Err(KeyEntryError::NotPositive("e"));
        }

        let public_key = RsaPublicKey::new(
            BigUint::from_bytes_be(modulus),
            BigUint::from_bytes_be(exponent),
        )
        .map_err(|e| KeyEntryError::InvalidKey(e.to_string()))?;

        Ok(Self {
            kid: kid.to_string(),
            public_key,
            algorithm,
            decoding_key: DecodingKey::from_rsa_raw_components(modulus, exponent),
        })
    }

    /// The key identifier.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The modulus.
    #[must_use]
    pub fn modulus(&self) -> &BigUint {
        self.public_key.n()
    }

    /// The public exponent.
    #[must_use]
    pub fn exponent(&self) -> &BigUint {
        self.public_key.e()
    }

    /// The algorithm this key was published for, if any.
    #[must_use]
    pub const fn algorithm(&self) -> Option<SigningAlgorithm> {
        self.algorithm
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.public_key.size() * 8
    }

    pub(crate) const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for VerifiablePublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiablePublicKey")
            .field("kid", &self.kid)
            .field("bits", &self.bits())
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl PartialEq for VerifiablePublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.kid == other.kid
            && self.public_key == other.public_key
            && self.algorithm == other.algorithm
    }
}

fn decode_component(field: &'static str, value: Option<&str>) -> Result<Vec<u8>, KeyEntryError> {
    let value = value.ok_or(KeyEntryError::MissingField(field))?;
    if value.is_empty() {
        return Err(KeyEntryError::MissingField(field));
    }
    decode_base64url(value).map_err(|source| KeyEntryError::InvalidBase64 { field, source })
}

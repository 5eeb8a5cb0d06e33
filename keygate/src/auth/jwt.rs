//! JWT verification module.
//!
//! Verifies bearer tokens against a `Keyset` snapshot. Every attempt ends in
//! a `VerificationVerdict`; nothing here panics or propagates a fault that a
//! caller could mistake for success.
//!
//! # Pre-conditions
//! - The keyset was built from the authority's published document.
//!
//! # Post-conditions
//! - `Authenticated` is returned only after the signature over the
//!   transmitted `header.payload` bytes checked out under a key taken from
//!   the keyset.
//!
//! # Invariants
//! - Verification is stateless: the verdict is a function of the credential,
//!   the keyset, the claim policy and the current time.
//! - Only RSA signature algorithms are accepted, chosen from a closed set.
//! - Key material embedded in or referenced by the token (`jwk`, `jku`,
//!   `x5c`, `x5u`) is never read.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::decode;
use serde_json::{Map, Value};

use super::SigningAlgorithm;
use super::claims::ClaimPolicy;
use crate::jwks::{Keyset, VerifiablePublicKey};

/// Claim set carried by an authenticated token.
pub type Claims = Map<String, Value>;

/// Prefix stripped from credentials before parsing.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a token was rejected.
///
/// The reason is for server-side diagnostics. Clients should receive the same
/// response for every reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// No credential was supplied.
    MissingCredential,
    /// The token is not three base64url segments with JSON header and payload,
    /// or verification hit an unexpected fault.
    Malformed,
    /// The header's `alg` is outside the supported RSA family.
    UnsupportedAlgorithm,
    /// The header has no string `kid`.
    MissingKeyId,
    /// The keyset has no key for the header's `kid`.
    UnknownKeyId,
    /// The key was published for a different algorithm than the token uses.
    KeyAlgorithmMismatch,
    /// The signature does not verify.
    BadSignature,
    /// The `exp` claim is in the past, or missing while expiry is enforced.
    Expired,
    /// The `nbf` claim is in the future.
    NotYetValid,
    /// The `iss` claim does not match the expected issuer.
    WrongIssuer,
    /// The `aud` claim does not contain the expected audience.
    WrongAudience,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "missing credential"),
            Self::Malformed => write!(f, "malformed token"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported signature algorithm"),
            Self::MissingKeyId => write!(f, "missing 'kid' header"),
            Self::UnknownKeyId => write!(f, "unknown key id"),
            Self::KeyAlgorithmMismatch => write!(f, "algorithm does not match key"),
            Self::BadSignature => write!(f, "invalid signature"),
            Self::Expired => write!(f, "token has expired"),
            Self::NotYetValid => write!(f, "token is not yet valid"),
            Self::WrongIssuer => write!(f, "unexpected issuer"),
            Self::WrongAudience => write!(f, "unexpected audience"),
        }
    }
}

impl std::error::Error for RejectReason {}

/// Outcome of one verification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationVerdict {
    /// The token is authentic; carries its claim set.
    Authenticated(Claims),
    /// The token was refused.
    Rejected(RejectReason),
}

impl VerificationVerdict {
    /// Whether the token was authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The claims, if authenticated.
    #[must_use]
    pub const fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Authenticated(claims) => Some(claims),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection reason, if rejected.
    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Authenticated(_) => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }

    /// Convert into a `Result`.
    ///
    /// # Errors
    /// Returns the rejection reason if the token was rejected.
    pub fn into_result(self) -> Result<Claims, RejectReason> {
        match self {
            Self::Authenticated(claims) => Ok(claims),
            Self::Rejected(reason) => Err(reason),
        }
    }
}

impl From<Result<Claims, RejectReason>> for VerificationVerdict {
    fn from(result: Result<Claims, RejectReason>) -> Self {
        match result {
            Ok(claims) => Self::Authenticated(claims),
            Err(reason) => Self::Rejected(reason),
        }
    }
}

/// Verifies a credential against `keyset` with no claim checks.
///
/// Equivalent to `TokenVerifier::default().verify(credential, keyset)`.
#[must_use]
pub fn verify(credential: &str, keyset: &Keyset) -> VerificationVerdict {
    TokenVerifier::default().verify(credential, keyset)
}

/// Token verifier with an optional claim policy.
///
/// The default policy checks only the signature and key binding.
#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    policy: ClaimPolicy,
}

impl TokenVerifier {
    /// Create a verifier applying `policy` after the signature check.
    #[must_use]
    pub const fn new(policy: ClaimPolicy) -> Self {
        Self { policy }
    }

    /// The claim policy in force.
    #[must_use]
    pub const fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// Verifies a credential. Time-based claims are checked against the
    /// system clock.
    #[must_use]
    pub fn verify(&self, credential: &str, keyset: &Keyset) -> VerificationVerdict {
        self.verify_token(credential, keyset).into()
    }

    fn verify_token(&self, credential: &str, keyset: &Keyset) -> Result<Claims, RejectReason> {
        let token = strip_bearer(credential)?;
        let parsed = ParsedToken::parse(token)?;
        let algorithm = parsed.algorithm()?;
        let key = resolve_key(&parsed.header, keyset)?;

        if key.algorithm().is_some_and(|bound| bound != algorithm) {
            return Err(RejectReason::KeyAlgorithmMismatch);
        }

        verify_signature(token, key, algorithm, &self.policy)
    }
}

/// Removes an optional `Bearer ` prefix.
fn strip_bearer(credential: &str) -> Result<&str, RejectReason> {
    let token = credential
        .strip_prefix(BEARER_PREFIX)
        .unwrap_or(credential)
        .trim();
    if token.is_empty() {
        return Err(RejectReason::MissingCredential);
    }
    Ok(token)
}

/// A structurally valid token's header. Holds no verified data.
struct ParsedToken {
    header: Map<String, Value>,
}

impl ParsedToken {
    fn parse(token: &str) -> Result<Self, RejectReason> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(RejectReason::Malformed);
        };

        let header = decode_json_object(header)?;
        decode_json_object(payload)?;
        let signature = decode_segment(signature)?;
        if signature.is_empty() {
            return Err(RejectReason::Malformed);
        }

        Ok(Self { header })
    }

    fn algorithm(&self) -> Result<SigningAlgorithm, RejectReason> {
        let alg = self.header.get("alg").ok_or(RejectReason::Malformed)?;
        alg.as_str()
            .and_then(SigningAlgorithm::from_name)
            .ok_or(RejectReason::UnsupportedAlgorithm)
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, RejectReason> {
    if segment.is_empty() {
        return Err(RejectReason::Malformed);
    }
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| RejectReason::Malformed)
}

fn decode_json_object(segment: &str) -> Result<Map<String, Value>, RejectReason> {
    let bytes = decode_segment(segment)?;
    serde_json::from_slice(&bytes).map_err(|_| RejectReason::Malformed)
}

/// Looks the header's `kid` up in the keyset, the only trusted key source.
fn resolve_key<'k>(
    header: &Map<String, Value>,
    keyset: &'k Keyset,
) -> Result<&'k VerifiablePublicKey, RejectReason> {
    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .ok_or(RejectReason::MissingKeyId)?;
    keyset.get(kid).ok_or(RejectReason::UnknownKeyId)
}

/// Checks the signature with the algorithm pinned by the verifier, then the
/// registered claims `policy` asks for.
fn verify_signature(
    token: &str,
    key: &VerifiablePublicKey,
    algorithm: SigningAlgorithm,
    policy: &ClaimPolicy,
) -> Result<Claims, RejectReason> {
    let validation = policy.validation(algorithm.to_jsonwebtoken());

    decode::<Claims>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

/// Maps jsonwebtoken errors to a rejection reason.
fn map_jwt_error(error: jsonwebtoken::errors::Error) -> RejectReason {
    use jsonwebtoken::errors::ErrorKind;

    match error.kind() {
        ErrorKind::InvalidSignature => RejectReason::BadSignature,
        ErrorKind::InvalidAlgorithm => RejectReason::UnsupportedAlgorithm,
        ErrorKind::ExpiredSignature => RejectReason::Expired,
        ErrorKind::ImmatureSignature => RejectReason::NotYetValid,
        ErrorKind::InvalidIssuer => RejectReason::WrongIssuer,
        ErrorKind::InvalidAudience => RejectReason::WrongAudience,
        ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
            "exp" => RejectReason::Expired,
            "iss" => RejectReason::WrongIssuer,
            "aud" => RejectReason::WrongAudience,
            _ => RejectReason::Malformed,
        },
        _ => RejectReason::Malformed,
    }
}

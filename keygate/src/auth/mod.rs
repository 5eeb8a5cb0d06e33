//! Authentication module.
//!
//! This module verifies bearer tokens against keysets published by an
//! identity authority.
//!
//! # Pre-conditions
//! - A keyset has been fetched and published before requests are verified.
//!
//! # Post-conditions
//! - Every verification attempt yields exactly one verdict.
//!
//! # Invariants
//! - Only RSA signature algorithms are accepted.
//! - Key material comes only from the published keyset.

mod algorithm;
pub mod claims;
pub mod jwt;
pub mod middleware;

pub use algorithm::SigningAlgorithm;
pub use claims::ClaimPolicy;
pub use jwt::{BEARER_PREFIX, Claims, RejectReason, TokenVerifier, VerificationVerdict, verify};
pub use middleware::{AuthState, AuthenticatedClaims, require_bearer};

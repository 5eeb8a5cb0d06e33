// Life of a request:
// 1. Startup fetches the authority's key-publication document into a keyset
// 2. A background task refetches it and swaps the published snapshot
// 3. Each request's bearer token is verified against one snapshot:
//     - Parse the three segments
//     - Gate the algorithm (RSA only)
//     - Resolve the key by `kid`
//     - Check the signature, then any configured claims
// 4. Authenticated claims are handed to the route; anything else is a 401

pub mod auth;
pub mod config;
pub mod jwks;
pub mod server;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod simulation;

pub use auth::{Claims, RejectReason, TokenVerifier, VerificationVerdict, verify};
pub use jwks::{FetchError, Keyset, KeysetHandle, fetch_keyset};

//! Deterministic simulation testing for token verification.
//!
//! Seeded generators produce intact and corrupted tokens; the verifier runs
//! against a fixed keyset and every verdict is checked against invariants:
//! - an intact token is `Authenticated` with the claims it was signed over
//! - a mutated token is never `Authenticated`
//! - a mutation with a single known cause yields exactly that reason
//!
//! Given the same seed, the run is identical.

#![allow(clippy::expect_used)]


pub use token_gen::{GeneratedToken, TokenGenerator, TokenMutation, TRUSTED_KID};

use crate::auth::{TokenVerifier, VerificationVerdict};
use crate::jwks::Keyset;
use crate::testing::{KEY_A_N, test_key};

/// A verdict that broke an invariant.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub seed: u64,
    pub step: usize,
    pub token: GeneratedToken,
    pub verdict: VerificationVerdict,
}

/// Summary of one simulation run.
#[derive(Debug, Default)]
pub struct SimulationResult {
    pub authenticated: usize,
    pub rejected: usize,
    pub violations: Vec<InvariantViolation>,
}

/// Run `steps` generated tokens through the verifier.
pub fn run(seed: u64, steps: usize) -> SimulationResult {
    let keyset = Keyset::from_keys([test_key(TRUSTED_KID, KEY_A_N)]);
    let verifier = TokenVerifier::default();
    let mut generator = TokenGenerator::new(seed);
    let mut result = SimulationResult::default();

    for step in 0..steps {
        let token = generator.next_token();
        let verdict = verifier.verify(&token.credential, &keyset);

        if verdict.is_authenticated() {
            result.authenticated += 1;
        } else {
            result.rejected += 1;
        }

        if !holds(&token, &verdict) {
            result.violations.push(InvariantViolation {
                seed,
                step,
                token,
                verdict,
            });
        }
    }

    result
}

fn holds(token: &GeneratedToken, verdict: &VerificationVerdict) -> bool {
    match (token.mutation, verdict) {
        (None, VerificationVerdict::Authenticated(claims)) => claims.contains_key("sub"),
        (None, VerificationVerdict::Rejected(_)) | (Some(_), VerificationVerdict::Authenticated(_)) => {
            false
        }
        (Some(mutation), VerificationVerdict::Rejected(reason)) => mutation
            .expected_reason()
            .is_none_or(|expected| expected == *reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_invariants_hold() {
        for seed in [1, 7, 42, 1337, 0xDEAD_BEEF] {
            let result = run(seed, 60);
            assert!(
                result.violations.is_empty(),
                "seed {seed}: {:#?}",
                result.violations
            );
            assert_eq!(result.authenticated + result.rejected, 60);
        }
    }

    #[test]
    fn test_simulation_is_reproducible() {
        let first = run(99, 40);
        let second = run(99, 40);
        assert_eq!(first.authenticated, second.authenticated);
        assert_eq!(first.rejected, second.rejected);
    }

    #[test]
    fn test_every_mutation_is_rejected() {
        let keyset = Keyset::from_keys([test_key(TRUSTED_KID, KEY_A_N)]);
        let mut generator = TokenGenerator::new(5);

        for mutation in TokenMutation::ALL {
            for _ in 0..3 {
                let token = generator.generate_mutated(mutation);
                let verdict = TokenVerifier::default().verify(&token.credential, &keyset);
                assert!(holds(&token, &verdict), "{mutation:?}: {verdict:?}");
            }
        }
    }
}

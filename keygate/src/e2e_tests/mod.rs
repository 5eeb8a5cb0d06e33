//! End-to-end tests from the authority's document to the HTTP verdict.
//!
//! Each test file covers one scenario. Authorities are in-process axum
//! servers on loopback, so nothing leaves the machine.

#![cfg(test)]
#![allow(clippy::expect_used)]

mod helpers;

mod test_snapshot_swap;

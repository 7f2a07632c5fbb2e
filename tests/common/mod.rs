//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Canonical example program text
pub const CANONICAL_TEXT: &str = "\
Title: Canonical PCR
Lid: 95

60s @ 95C Burn In
x35:
    20s @ 95C Denature
    15s @ 65C Anneal
    30s @ 72C Extend
20s @ 4C Chill
";

/// Wire string the canonical program must compile to
pub const CANONICAL_WIRE: &str = "s=ACGTC&l=95&c=start&n=Canonical PCR&p=([60|95|Burn In])(35[20|95|Denature][15|65|Anneal][30|72|Extend])([20|4|Chill])";

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

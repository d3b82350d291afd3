//! Epsilon-tolerant time comparisons.
//!
//! All floating-point comparisons that gate scheduling decisions go through
//! these helpers so that the tolerance is defined in exactly one place.
//! Tie-breaks that must be deterministic are defined on integer ids instead.

/// Tolerance for comparing time values.
pub const EPSILON: f64 = 1e-10;

pub fn eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

pub fn less(a: f64, b: f64) -> bool {
    !eq(a, b) && a < b
}

pub fn less_or_eq(a: f64, b: f64) -> bool {
    eq(a, b) || a < b
}

pub fn greater(a: f64, b: f64) -> bool {
    !eq(a, b) && a > b
}

pub fn greater_or_eq(a: f64, b: f64) -> bool {
    eq(a, b) || a > b
}

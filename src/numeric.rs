//! Numeric backends for stat tables.
//!
//! Plain modifier sums are integral (`i64`); weighted sums are fractional
//! (`f64`). Both go through the same aggregation code via `StatNumeric`.

use std::fmt;
use std::ops::{Add, Mul};

/// Trait for numeric operations required by stat aggregation.
///
/// This trait abstracts over `i64` and `f64` so `StatTable` and the
/// aggregation functions are written once.
pub trait StatNumeric:
    Clone + Copy + PartialEq + PartialOrd + fmt::Debug + fmt::Display + Add<Output = Self> + Mul<Output = Self> + Default
{
    /// Create a zero value.
    fn zero() -> Self;

    /// Create a value from an integer.
    fn from_int(i: i64) -> Self;
}

impl StatNumeric for i64 {
    fn zero() -> Self {
        0
    }

    fn from_int(i: i64) -> Self {
        i
    }
}

impl StatNumeric for f64 {
    fn zero() -> Self {
        0.0
    }

    fn from_int(i: i64) -> Self {
        i as f64
    }
}

/// Round half away from zero to `places` decimal places.
///
/// ```rust
/// use itemfilter::numeric::round_to;
///
/// assert_eq!(round_to(1.234, 2), 1.23);
/// assert_eq!(round_to(1.236, 2), 1.24);
/// ```
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places as i32);
    (value * factor).round() / factor
}

//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert a count to f64, allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(f64::MAX)
}

/// Map a raw 64-bit draw onto `[0, 1)` using its top 53 bits.
#[must_use]
pub fn sample_ratio(sample: u64) -> f64 {
    const SCALE: f64 = 1.0 / (1u64 << 53) as f64;
    cast::<u64, f64>(sample >> 11).unwrap_or(0.0) * SCALE
}

/// Clamp a probability into `[0, 1]`, returning 0.0 for NaN.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

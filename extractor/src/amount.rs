//! Conversion between display-precision amounts and integer base units.
//!
//! Every monetary value entering or leaving storage passes through here; fee
//! and volume arithmetic is done on the converted integers only.

/// Base units per coin.
pub const COIN: i64 = 100_000_000;

/// Convert a display value (e.g. `0.01`) to base units, rounding half away
/// from zero.
pub fn to_base_units(display_value: f64) -> i64 {
    (display_value * COIN as f64).round() as i64
}

/// Convert base units back to a display value.
pub fn to_display_units(base_units: i64) -> f64 {
    base_units as f64 / COIN as f64
}

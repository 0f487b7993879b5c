use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

use crate::constants::amount::TOKEN_DECIMALS;

/// Converts a fixed-point integer amount into its display value, `raw / 10^decimals`.
///
/// The integer and fractional parts are split with exact big-integer division before
/// either side is turned into a float, so raw values far beyond `u64::MAX` keep their
/// magnitude and `normalize_amount(a, 0)` is exact for every `a` a float can hold.
pub fn normalize_amount(raw: &BigUint, decimals: u32) -> f64 {
    if raw.is_zero() {
        return 0.0;
    }
    let divisor = BigUint::from(10u32).pow(decimals);
    let whole = raw / &divisor;
    let fraction = raw % &divisor;

    let whole = whole.to_f64().unwrap_or(f64::INFINITY);
    if fraction.is_zero() {
        return whole;
    }
    let fraction = fraction.to_f64().unwrap_or(0.0) / 10f64.powi(decimals as i32);
    whole + fraction
}

/// Normalizes a wei-denominated amount with the token's 18 decimals.
pub fn wei_to_float(raw: &BigUint) -> f64 {
    normalize_amount(raw, TOKEN_DECIMALS)
}

//! Fixed-point nectar arithmetic.
//!
//! Every nectar quantity (pool amounts, bee loads, capacities, rates) is a
//! fixed-point number. Fixed-point addition is exact and associative, so the
//! colony's nectar total is conserved bit-for-bit and the final amount of a pool
//! does not depend on the order in which agents were settled against it.

use fixed::types::I48F16;

/// Fixed-point nectar quantity.
///
/// I48F16: 48 integer bits, 16 fractional bits (resolution ~0.000015),
/// far finer than the 0.01 epsilon the exchange rules compare against.
pub type Nectar = I48F16;

/// Nectar moved during one tick for a per-second rate.
pub fn per_tick(rate_per_second: Nectar, delta_seconds: f32) -> Nectar {
    rate_per_second * Nectar::from_num(delta_seconds)
}

/// `part / whole` as a float in `[0, 1]`, zero for an empty `whole`.
pub fn ratio(part: Nectar, whole: Nectar) -> f32 {
    if whole <= Nectar::ZERO {
        return 0.0;
    }
    (part / whole).to_num::<f32>().clamp(0.0, 1.0)
}

/// Sum of many nectar values. Exact, so the order of `values` never matters.
pub fn total<I: IntoIterator<Item = Nectar>>(values: I) -> Nectar {
    values.into_iter().fold(Nectar::ZERO, |acc, v| acc + v)
}

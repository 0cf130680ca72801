// Randomization - Bounded random samples around a base value
//
// A fraction `frac` allows the sample to deviate from `base` by up to
// `frac * base` in either direction. Negative bases or fractions above 1 are
// passed through unclamped: the resulting range may cross zero or be
// inverted, and is sampled as given.

use rand::Rng;

/// Lower bound of the randomization range, rounded to 2 decimals
pub fn calc_min(base: f64, frac: f64) -> f64 {
    round2(base - frac * base)
}

/// Upper bound of the randomization range, rounded to 2 decimals
pub fn calc_max(base: f64, frac: f64) -> f64 {
    round2(base + frac * base)
}

/// Round to 2 decimal places, half away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sample uniformly between the rounded bounds of `base ± frac·base`
///
/// Bounds and sample are rounded to 2 decimals, so the result may sit up to
/// half a hundredth outside the exact range.
pub fn resolve(base: f64, frac: f64) -> f64 {
    resolve_with(&mut rand::thread_rng(), base, frac)
}

/// Same as [`resolve`] with a caller-supplied random source
///
/// `frac == 0` returns `base` exactly without touching `rng`.
pub fn resolve_with<R: Rng + ?Sized>(rng: &mut R, base: f64, frac: f64) -> f64 {
    if frac == 0.0 {
        return base;
    }

    let min = calc_min(base, frac);
    let max = calc_max(base, frac);
    if !min.is_finite() || !max.is_finite() {
        return base;
    }

    // an inverted range (negative base) is sampled between its endpoints
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    round2(rng.gen_range(lo..=hi))
}

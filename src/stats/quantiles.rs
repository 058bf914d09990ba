use super::{Outcome, is_degenerate, round2};

/// Non-exceedance probabilities of Q99, Q95, Q50, Q05 and Q01 (Q99 is the
/// flow exceeded 99% of the time).
pub const FLOW_QUANTILES: [f64; 5] = [0.01, 0.05, 0.50, 0.95, 0.99];

/// Linear-interpolation quantile (R type 7, numpy's default).
///
/// **Expects pre-sorted, non-empty input.**
pub fn quantile_linear(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

pub fn sorted_copy(sample: &[f64]) -> Vec<f64> {
    let mut sorted = sample.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Q99, Q95, Q50, Q05 and Q01 of a window, rounded to two places.
pub fn flow_quantiles(sample: &[f64]) -> [Outcome; 5] {
    if is_degenerate(sample) {
        return [Outcome::Degenerate; 5];
    }
    let sorted = sorted_copy(sample);
    FLOW_QUANTILES.map(|p| Outcome::Value(round2(quantile_linear(&sorted, p))))
}

// Per-window flow statistics.
//
// Every statistic reports an `Outcome` rather than a bare number so that
// "the window had nothing to say" and "the distribution fit broke" stay
// distinguishable until the values are written out.

pub mod exceedance;
pub mod lmoments;
pub mod quantiles;
pub mod return_period;

use crate::periods::Window;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Value(f64),
    /// Empty, constant or otherwise uninformative window.
    Degenerate,
    /// The extreme-value fit did not produce a usable distribution.
    FitFailed,
    /// No historical threshold exists for the cell.
    MissingBaseline,
}

impl Outcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            Outcome::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Value(_) => "ok",
            Outcome::Degenerate => "degenerate",
            Outcome::FitFailed => "fit_failed",
            Outcome::MissingBaseline => "missing_baseline",
        }
    }

    /// Inverse of [`Outcome::status`] for values read back from storage.
    pub fn from_status(status: &str, value: Option<f64>) -> Option<Self> {
        match (status, value) {
            ("ok", Some(v)) => Some(Outcome::Value(v)),
            ("degenerate", _) => Some(Outcome::Degenerate),
            ("fit_failed", _) => Some(Outcome::FitFailed),
            ("missing_baseline", _) => Some(Outcome::MissingBaseline),
            _ => None,
        }
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Outcome {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            other => other,
        }
    }
}

/// Round to two decimal places, the precision of every reported metric.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Absolute flow magnitudes of `series` inside `window`, clipped to the
/// series length.
pub fn absolute_sample(series: &[f32], window: Window) -> Vec<f64> {
    let end = window.end.min(series.len());
    let start = window.start.min(end);
    series[start..end].iter().map(|&q| (q as f64).abs()).collect()
}

/// True when the sample can't support any statistic: empty, non-finite, or
/// without spread.
pub(crate) fn is_degenerate(sample: &[f64]) -> bool {
    let Some(&first) = sample.first() else {
        return true;
    };
    if sample.iter().any(|v| !v.is_finite()) {
        return true;
    }
    sample.iter().all(|&v| v == first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_to_two_places() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(-1.236), -1.24);
        assert_eq!(round2(45.5), 45.5);
    }

    #[test]
    fn status_round_trips() {
        for outcome in [
            Outcome::Value(2.5),
            Outcome::Degenerate,
            Outcome::FitFailed,
            Outcome::MissingBaseline,
        ] {
            let back = Outcome::from_status(outcome.status(), outcome.value());
            assert_eq!(back, Some(outcome));
        }
        assert_eq!(Outcome::from_status("ok", None), None);
    }

    #[test]
    fn sample_is_absolute_and_clipped() {
        let series = [1.0f32, -2.0, 3.0, -4.0];
        let sample = absolute_sample(&series, Window { start: 1, end: 10 });
        assert_eq!(sample, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn degenerate_samples() {
        assert!(is_degenerate(&[]));
        assert!(is_degenerate(&[0.0, 0.0, 0.0]));
        assert!(is_degenerate(&[1.0, f64::NAN]));
        assert!(!is_degenerate(&[0.0, 0.1]));
    }
}

use super::{Outcome, is_degenerate, round2};
use crate::baseline::BaselineThresholds;

/// Counts days past historical thresholds, normalised to a yearly rate.
#[derive(Debug, Clone, Copy)]
pub struct ExceedanceCounter {
    days_per_year: usize,
}

impl ExceedanceCounter {
    pub fn new(days_per_year: usize) -> Self {
        ExceedanceCounter { days_per_year }
    }

    /// Annual counts below the very-low and low thresholds, then above the
    /// high and very-high thresholds (LTQ99, LTQ95, GTQ05, GTQ01).
    pub fn rates(&self, sample: &[f64], thresholds: &BaselineThresholds) -> [Outcome; 4] {
        if is_degenerate(sample) || self.days_per_year == 0 {
            return [Outcome::Degenerate; 4];
        }
        let years = sample.len() as f64 / self.days_per_year as f64;

        let below = |threshold: Option<f64>| match threshold {
            Some(t) => {
                let count = sample.iter().filter(|&&q| q < t).count();
                Outcome::Value(round2(count as f64 / years))
            }
            None => Outcome::MissingBaseline,
        };
        let above = |threshold: Option<f64>| match threshold {
            Some(t) => {
                let count = sample.iter().filter(|&&q| q > t).count();
                Outcome::Value(round2(count as f64 / years))
            }
            None => Outcome::MissingBaseline,
        };

        [
            below(thresholds.very_low),
            below(thresholds.low),
            above(thresholds.high),
            above(thresholds.very_high),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(very_low: f64, low: f64, high: f64, very_high: f64) -> BaselineThresholds {
        BaselineThresholds {
            very_low: Some(very_low),
            low: Some(low),
            high: Some(high),
            very_high: Some(very_high),
        }
    }

    #[test]
    fn rates_are_per_360_day_year() {
        let counter = ExceedanceCounter::new(360);
        // Two years of a 1..=720 ramp.
        let sample: Vec<f64> = (1..=720).map(f64::from).collect();
        let rates = counter.rates(&sample, &thresholds(11.0, 101.0, 620.0, 1000.0));
        assert_eq!(rates[0], Outcome::Value(5.0));
        assert_eq!(rates[1], Outcome::Value(50.0));
        assert_eq!(rates[2], Outcome::Value(50.0));
        assert_eq!(rates[3], Outcome::Value(0.0));
    }

    #[test]
    fn ninety_day_window_never_exceeds_large_threshold() {
        let counter = ExceedanceCounter::new(360);
        let sample: Vec<f64> = (1..=90).map(f64::from).collect();
        let rates = counter.rates(&sample, &thresholds(0.5, 1.0, 1000.0, 1000.0));
        assert_eq!(rates[2], Outcome::Value(0.0));
        assert_eq!(rates[3], Outcome::Value(0.0));
        assert_eq!(rates[0], Outcome::Value(0.0));
    }

    #[test]
    fn missing_threshold_is_reported_per_rate() {
        let counter = ExceedanceCounter::new(360);
        let sample = [1.0, 2.0, 3.0];
        let mut t = thresholds(1.5, 2.5, 2.5, 2.5);
        t.low = None;
        let rates = counter.rates(&sample, &t);
        assert!(rates[0].is_value());
        assert_eq!(rates[1], Outcome::MissingBaseline);
    }

    #[test]
    fn empty_window_is_degenerate_not_infinite() {
        let counter = ExceedanceCounter::new(360);
        assert_eq!(counter.rates(&[], &thresholds(1.0, 1.0, 1.0, 1.0)), [Outcome::Degenerate; 4]);
    }
}

use super::lmoments::{GevFitError, fit_gev};
use super::{Outcome, round2};
use crate::direction::Direction;
use tracing::debug;

/// Estimates flows for fixed return periods from a daily window: annual
/// maxima of consecutive whole years are fitted with a GEV by L-moments.
#[derive(Debug, Clone)]
pub struct ReturnPeriodEstimator {
    periods: Vec<u32>,
    days_per_year: usize,
}

impl ReturnPeriodEstimator {
    pub fn new(periods: &[u32], days_per_year: usize) -> Self {
        ReturnPeriodEstimator {
            periods: periods.to_vec(),
            days_per_year,
        }
    }

    pub fn periods(&self) -> &[u32] {
        &self.periods
    }

    /// Maximum of each whole year in the window; a trailing partial year is
    /// ignored.
    pub fn annual_maxima(&self, sample: &[f64]) -> Vec<f64> {
        if self.days_per_year == 0 {
            return Vec::new();
        }
        sample
            .chunks_exact(self.days_per_year)
            .map(|year| year.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            .collect()
    }

    /// Fit the maxima directly and return unsigned, unrounded return levels.
    pub fn fit_sample(&self, maxima: &[f64]) -> Result<Vec<f64>, GevFitError> {
        let nonzero = maxima.iter().filter(|&&q| q != 0.0).count();
        if nonzero < 3 {
            return Err(GevFitError::TooFewValues(nonzero));
        }
        let gev = fit_gev(maxima)?;
        let levels: Vec<f64> = self
            .periods
            .iter()
            .map(|&t| gev.return_level(t as f64))
            .collect();
        if levels.iter().any(|v| !v.is_finite()) {
            return Err(GevFitError::NonFinite);
        }
        Ok(levels)
    }

    /// One outcome per return period. Flows towards the south or west come
    /// back negative; every failure masks all periods for the window.
    pub fn estimate(&self, sample: &[f64], direction: Direction) -> Vec<Outcome> {
        let maxima = self.annual_maxima(sample);
        match self.fit_sample(&maxima) {
            Ok(levels) => levels
                .into_iter()
                .map(|q| Outcome::Value(round2(direction.sign() * q)))
                .collect(),
            Err(err) => {
                debug!("Return-period fit rejected: {}", err);
                let outcome = if err.is_degenerate_sample() {
                    Outcome::Degenerate
                } else {
                    Outcome::FitFailed
                };
                vec![outcome; self.periods.len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RETURN_PERIODS;
    use crate::stats::lmoments::Gev;

    fn daily_with_maxima(maxima: &[f64], days: usize) -> Vec<f64> {
        let mut sample = Vec::with_capacity(maxima.len() * days);
        for &peak in maxima {
            let mut year = vec![peak * 0.1; days];
            year[days / 2] = peak;
            sample.extend(year);
        }
        sample
    }

    #[test]
    fn maxima_use_whole_years_only() {
        let est = ReturnPeriodEstimator::new(&RETURN_PERIODS, 4);
        let sample = [1.0, 5.0, 2.0, 0.0, 3.0, 3.5, 1.0, 0.0, 9.0];
        assert_eq!(est.annual_maxima(&sample), vec![5.0, 3.5]);
    }

    #[test]
    fn constant_window_is_missing_for_every_period() {
        let est = ReturnPeriodEstimator::new(&RETURN_PERIODS, 360);
        let out = est.estimate(&vec![2.5; 360 * 30], Direction::East);
        assert_eq!(out, vec![Outcome::Degenerate; 7]);
    }

    #[test]
    fn ephemeral_cell_is_degenerate() {
        let est = ReturnPeriodEstimator::new(&RETURN_PERIODS, 10);
        let mut maxima = vec![0.0; 20];
        maxima[3] = 1.0;
        maxima[7] = 2.0;
        let out = est.estimate(&daily_with_maxima(&maxima, 10), Direction::North);
        assert!(out.iter().all(|o| *o == Outcome::Degenerate));
    }

    #[test]
    fn levels_increase_with_period_and_carry_sign() {
        let truth = Gev {
            location: 40.0,
            scale: 8.0,
            shape: 0.05,
        };
        let maxima: Vec<f64> = (0..30)
            .map(|i| truth.quantile((i as f64 + 0.5) / 30.0))
            .collect();
        let est = ReturnPeriodEstimator::new(&RETURN_PERIODS, 360);
        let daily = daily_with_maxima(&maxima, 360);

        let east = est.estimate(&daily, Direction::East);
        let west = est.estimate(&daily, Direction::West);
        let east: Vec<f64> = east.iter().map(|o| o.value().unwrap()).collect();
        let west: Vec<f64> = west.iter().map(|o| o.value().unwrap()).collect();

        assert!(east.windows(2).all(|w| w[0] < w[1]));
        for (e, w) in east.iter().zip(&west) {
            assert_eq!(*w, -*e);
        }
        // The 2-year flow sits near the median annual maximum.
        assert!((east[0] - truth.quantile(0.5)).abs() < 2.0);
    }

    #[test]
    fn fit_sample_matches_analytic_return_level() {
        let truth = Gev {
            location: 200.0,
            scale: 60.0,
            shape: -0.05,
        };
        let maxima: Vec<f64> = (0..5000)
            .map(|i| truth.quantile((i as f64 + 0.5) / 5000.0))
            .collect();
        let est = ReturnPeriodEstimator::new(&[10, 100], 360);
        let levels = est.fit_sample(&maxima).unwrap();
        for (level, t) in levels.iter().zip([10.0, 100.0]) {
            let analytic = truth.return_level(t);
            assert!((level - analytic).abs() / analytic < 0.01);
        }
    }
}

// Historical-baseline flow thresholds, one set per river cell.

use crate::config::{
    DIRECTION_LEAD_STEPS, HISTORICAL_COMPLETE_FRACTION, HISTORICAL_EXPECTED_DAYS,
    HISTORICAL_SPINUP_DAYS,
};
use crate::direction::resolve_direction;
use crate::flows::{CellSeries, FlowSource, RunRequirement};
use crate::network::NetworkLookup;
use crate::periods::Window;
use crate::stats::quantiles::{quantile_linear, sorted_copy};
use crate::stats::{absolute_sample, round2};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Thresholds from the reference run: very-low (Q99), low (Q95), high (Q05)
/// and very-high (Q01) flow.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BaselineThresholds {
    pub very_low: Option<f64>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub very_high: Option<f64>,
}

impl BaselineThresholds {
    pub const MISSING: BaselineThresholds = BaselineThresholds {
        very_low: None,
        low: None,
        high: None,
        very_high: None,
    };

    /// Thresholds of one cell's dominant-channel flow after the spin-up.
    pub fn from_cell(series: &CellSeries<'_>, spinup: usize, lead: usize) -> Self {
        let direction = resolve_direction(series, lead);
        let window = Window {
            start: spinup,
            end: series.len(),
        };
        let sample = absolute_sample(series.channel(direction.channel()), window);
        if sample.is_empty() || sample.iter().any(|v| !v.is_finite()) {
            return BaselineThresholds::MISSING;
        }
        let sorted = sorted_copy(&sample);
        let q = |p: f64| Some(round2(quantile_linear(&sorted, p)));
        BaselineThresholds {
            very_low: q(0.01),
            low: q(0.05),
            high: q(0.95),
            very_high: q(0.99),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoricalBaseline {
    thresholds: HashMap<String, BaselineThresholds>,
}

impl HistoricalBaseline {
    pub fn new() -> Self {
        HistoricalBaseline::default()
    }

    pub fn insert(&mut self, network_id: impl Into<String>, thresholds: BaselineThresholds) {
        self.thresholds.insert(network_id.into(), thresholds);
    }

    /// Thresholds for a cell; absent cells get all-missing thresholds.
    pub fn get(&self, network_id: &str) -> BaselineThresholds {
        self.thresholds
            .get(network_id)
            .copied()
            .unwrap_or(BaselineThresholds::MISSING)
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Compute thresholds from each catchment's historical reference run.
    /// Catchments whose run is missing, unreadable or incomplete are skipped.
    pub fn from_reference_runs(source: &dyn FlowSource, network: &NetworkLookup) -> Self {
        let requirement =
            RunRequirement::historical(HISTORICAL_EXPECTED_DAYS, HISTORICAL_COMPLETE_FRACTION);
        let mut baseline = HistoricalBaseline::new();

        for catchment in network.catchments() {
            let array = match source.load_historical(catchment) {
                Ok(Some(array)) => array,
                Ok(None) => {
                    debug!("No historical run for catchment {}", catchment);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to load historical run for {}: {}", catchment, e);
                    continue;
                }
            };
            let Some(array) = requirement.apply(array) else {
                warn!("Historical run for {} is incomplete, skipping", catchment);
                continue;
            };

            for cell in network.cells_in(catchment) {
                let series = match cell.cell_index().and_then(|i| array.cell(i)) {
                    Ok(series) => series,
                    Err(e) => {
                        warn!("{}: {}", cell.network_id(), e);
                        continue;
                    }
                };
                let thresholds = BaselineThresholds::from_cell(
                    &series,
                    HISTORICAL_SPINUP_DAYS,
                    DIRECTION_LEAD_STEPS,
                );
                baseline.insert(cell.network_id(), thresholds);
            }
        }

        info!("Historical thresholds computed for {} cells", baseline.len());
        baseline
    }
}

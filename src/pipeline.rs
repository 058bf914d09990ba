// The supervising loop over (catchment, realization) units of work.
//
// Catchments are taken in batches. Within a batch each catchment is one rayon
// job that loads and discards its realizations one at a time and returns
// plain records; the batch is then folded into the `ResultSet` on the calling
// thread in catchment order, so parallel and serial runs give the same tables.

use crate::baseline::HistoricalBaseline;
use crate::config::{
    CLIMATE_RUN_DAYS, DAYS_PER_YEAR, DIRECTION_LEAD_STEPS, EnsembleConfig, MetricSelection,
    RETURN_PERIODS,
};
use crate::direction::resolve_direction;
use crate::flows::{FlowArray, FlowSource, RunRequirement};
use crate::network::NetworkLookup;
use crate::stats::exceedance::ExceedanceCounter;
use crate::stats::quantiles::flow_quantiles;
use crate::stats::return_period::ReturnPeriodEstimator;
use crate::stats::{Outcome, absolute_sample};
use crate::store::{Metric, OutcomeCounts, ResultSet};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// What happened to one (catchment, realization) unit.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitStatus {
    Processed { cells: usize },
    Missing,
    Incomplete { timesteps: usize },
    Failed(String),
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Processed { cells } => write!(f, "processed {} cells", cells),
            UnitStatus::Missing => write!(f, "no simulation output"),
            UnitStatus::Incomplete { timesteps } => {
                write!(f, "incomplete run ({} timesteps)", timesteps)
            }
            UnitStatus::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub catchment: String,
    pub realization: String,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
    pub outcomes: OutcomeCounts,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&UnitStatus) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.status)).count()
    }

    pub fn processed(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Processed { .. }))
    }

    pub fn missing(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Missing))
    }

    pub fn incomplete(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Incomplete { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UnitStatus::Failed(_)))
    }

    pub fn status_of(&self, catchment: &str, realization: &str) -> Option<&UnitStatus> {
        self.units
            .iter()
            .find(|u| u.catchment == catchment && u.realization == realization)
            .map(|u| &u.status)
    }

    pub fn log_summary(&self) {
        info!(
            "Units: {} processed, {} missing, {} incomplete, {} failed",
            self.processed(),
            self.missing(),
            self.incomplete(),
            self.failed()
        );
        info!(
            "Outcomes: {} values, {} degenerate, {} failed fits, {} without baseline",
            self.outcomes.values,
            self.outcomes.degenerate,
            self.outcomes.fit_failed,
            self.outcomes.missing_baseline
        );
    }
}

// Catchments in flight per worker thread before results are folded in.
const CATCHMENTS_PER_THREAD: usize = 4;

/// One computed cell of one metric table. `cell` indexes
/// `NetworkLookup::cells`, `period` the ensemble's period list.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Record {
    metric: Metric,
    cell: usize,
    period: usize,
    outcome: Outcome,
}

struct UnitOutput {
    report: UnitReport,
    records: Vec<Record>,
}

pub struct Pipeline<'a> {
    ensemble: &'a EnsembleConfig,
    network: &'a NetworkLookup,
    baseline: &'a HistoricalBaseline,
    selection: MetricSelection,
    requirement: RunRequirement,
    exceedance: ExceedanceCounter,
    return_periods: ReturnPeriodEstimator,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        ensemble: &'a EnsembleConfig,
        network: &'a NetworkLookup,
        baseline: &'a HistoricalBaseline,
        selection: MetricSelection,
    ) -> Self {
        Pipeline {
            ensemble,
            network,
            baseline,
            selection,
            requirement: RunRequirement::climate(CLIMATE_RUN_DAYS),
            exceedance: ExceedanceCounter::new(DAYS_PER_YEAR),
            return_periods: ReturnPeriodEstimator::new(&RETURN_PERIODS, DAYS_PER_YEAR),
        }
    }

    /// Override the completeness rule for climate runs.
    pub fn with_requirement(mut self, requirement: RunRequirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// An empty result set spanning every network id, realization and period.
    pub fn result_set(&self) -> ResultSet {
        ResultSet::new(
            &Metric::selected(&self.selection),
            &self.network.network_ids(),
            self.ensemble.realizations(),
            &self.ensemble.period_names(),
        )
    }

    /// Process every (catchment, realization) unit and write the outcomes
    /// into `results`. Every unit is marked as attempted, whatever its status,
    /// so persisted values of units that now have no output are dropped on
    /// merge. Failures are recorded in the report, never raised.
    pub fn run(
        &self,
        source: &dyn FlowSource,
        results: &mut ResultSet,
        progress: Option<&ProgressBar>,
    ) -> RunReport {
        let ids = self.network.network_ids();
        let periods = self.ensemble.period_names();
        let batch = rayon::current_num_threads().max(1) * CATCHMENTS_PER_THREAD;
        let mut report = RunReport::default();

        for catchments in self.network.catchments().chunks(batch) {
            let outputs: Vec<Vec<UnitOutput>> = catchments
                .par_iter()
                .map(|catchment| {
                    let units = self.process_catchment(source, catchment);
                    if let Some(pb) = progress {
                        pb.inc(1);
                    }
                    units
                })
                .collect();

            for output in outputs.into_iter().flatten() {
                let realization = &output.report.realization;
                for &cell in self.network.cell_indices(&output.report.catchment) {
                    results.mark_attempted(&ids[cell], realization);
                }
                for record in output.records {
                    report.outcomes.add(record.outcome);
                    results.set(
                        record.metric,
                        &ids[record.cell],
                        realization,
                        &periods[record.period],
                        record.outcome,
                    );
                }
                report.units.push(output.report);
            }
        }
        report
    }

    fn process_catchment(&self, source: &dyn FlowSource, catchment: &str) -> Vec<UnitOutput> {
        self.ensemble
            .realizations()
            .iter()
            .enumerate()
            .map(|(index, realization)| {
                let (status, records) = match source.load(catchment, realization) {
                    Ok(None) => {
                        debug!("No output for catchment {} realization {}", catchment, realization);
                        (UnitStatus::Missing, Vec::new())
                    }
                    Err(e) => {
                        warn!("Catchment {} realization {}: {}", catchment, realization, e);
                        (UnitStatus::Failed(e.to_string()), Vec::new())
                    }
                    Ok(Some(array)) => {
                        let timesteps = array.timesteps();
                        match self.requirement.apply(array) {
                            Some(array) => self.process_unit(catchment, realization, index, &array),
                            None => {
                                warn!(
                                    "Catchment {} realization {} skipped as incomplete ({} timesteps)",
                                    catchment, realization, timesteps
                                );
                                (UnitStatus::Incomplete { timesteps }, Vec::new())
                            }
                        }
                    }
                };
                UnitOutput {
                    report: UnitReport {
                        catchment: catchment.to_string(),
                        realization: realization.clone(),
                        status,
                    },
                    records,
                }
            })
            .collect()
    }

    #[instrument(level = "debug", skip(self, array))]
    fn process_unit(
        &self,
        catchment: &str,
        realization: &str,
        realization_index: usize,
        array: &FlowArray,
    ) -> (UnitStatus, Vec<Record>) {
        let calendar = self.ensemble.calendar();
        let mut records = Vec::new();
        let mut cells = 0;

        for &cell_pos in self.network.cell_indices(catchment) {
            let cell = &self.network.cells()[cell_pos];
            let entity = cell.network_id();
            let series = match cell.cell_index().and_then(|i| array.cell(i)) {
                Ok(series) => series,
                Err(e) => {
                    warn!("{}: {}", entity, e);
                    continue;
                }
            };
            let direction = resolve_direction(&series, DIRECTION_LEAD_STEPS);
            let channel = series.channel(direction.channel());
            let thresholds = self.baseline.get(&entity);

            for (period_index, period) in self.ensemble.periods().iter().enumerate() {
                let window = period.window(realization_index, series.len(), calendar);
                let sample = absolute_sample(channel, window);
                let mut push = |metric: Metric, outcome: Outcome| {
                    records.push(Record {
                        metric,
                        cell: cell_pos,
                        period: period_index,
                        outcome,
                    });
                };

                if self.selection.flow_stats {
                    for (metric, outcome) in Metric::QUANTILES.into_iter().zip(flow_quantiles(&sample)) {
                        push(metric, outcome);
                    }
                    let rates = self.exceedance.rates(&sample, &thresholds);
                    for (metric, outcome) in Metric::EXCEEDANCES.into_iter().zip(rates) {
                        push(metric, outcome);
                    }
                }
                if self.selection.return_periods {
                    let levels = self.return_periods.estimate(&sample, direction);
                    for (&t, outcome) in self.return_periods.periods().iter().zip(levels) {
                        push(Metric::ReturnPeriod(t), outcome);
                    }
                }
            }
            cells += 1;
        }

        debug!("{} records from {} cells", records.len(), cells);
        (UnitStatus::Processed { cells }, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineThresholds;
    use crate::config::LookupColumns;
    use crate::error::{FlowStatsError, FlowStatsResult};
    use crate::periods::WarmingLevelTable;
    use std::collections::HashMap;

    // `None` entries stand for unreadable files.
    struct MapSource(HashMap<(String, String), Option<FlowArray>>);

    impl FlowSource for MapSource {
        fn load(&self, catchment: &str, realization: &str) -> FlowStatsResult<Option<FlowArray>> {
            match self.0.get(&(catchment.to_string(), realization.to_string())) {
                None => Ok(None),
                Some(Some(array)) => Ok(Some(array.clone())),
                Some(None) => Err(FlowStatsError::Config("corrupt file".into())),
            }
        }
    }

    fn north_cell(values: Vec<f32>) -> [Vec<f32>; 4] {
        let n = values.len();
        [values, vec![0.0; n], vec![0.0; n], vec![0.0; n]]
    }

    fn small_ensemble() -> EnsembleConfig {
        EnsembleConfig::new(
            vec!["01".into(), "04".into()],
            vec![("first".into(), 0, 90)],
            WarmingLevelTable::new(None, vec![]),
        )
        .unwrap()
    }

    #[test]
    fn units_are_isolated() {
        let ensemble = small_ensemble();
        let network =
            NetworkLookup::from_network_ids(["1.001", "2.001", "3.001"], &LookupColumns::new()).unwrap();
        let baseline = HistoricalBaseline::new();
        let selection = MetricSelection {
            flow_stats: true,
            return_periods: false,
        };
        let pipeline = Pipeline::new(&ensemble, &network, &baseline, selection)
            .with_requirement(RunRequirement::climate(90));

        let ramp: Vec<f32> = (1..=90).map(|v| v as f32).collect();
        let mut map = HashMap::new();
        map.insert(
            ("1".to_string(), "01".to_string()),
            FlowArray::from_cells(vec![north_cell(ramp.clone())]).ok(),
        );
        map.insert(
            ("2".to_string(), "01".to_string()),
            None,
        );
        map.insert(
            ("3".to_string(), "04".to_string()),
            FlowArray::from_cells(vec![north_cell(ramp[..50].to_vec())]).ok(),
        );
        let source = MapSource(map);

        let mut results = pipeline.result_set();
        let report = pipeline.run(&source, &mut results, None);

        assert_eq!(report.units.len(), 6);
        assert_eq!(report.status_of("1", "01"), Some(&UnitStatus::Processed { cells: 1 }));
        assert!(matches!(report.status_of("2", "01"), Some(UnitStatus::Failed(_))));
        assert_eq!(report.status_of("3", "04"), Some(&UnitStatus::Incomplete { timesteps: 50 }));
        assert_eq!(report.missing(), 3);

        let q50 = results.store(Metric::Q50).unwrap();
        assert_eq!(q50.get("1.001", "01", "first"), Some(Outcome::Value(45.5)));
        assert_eq!(q50.get("3.001", "04", "first"), None);
        let ltq99 = results.store(Metric::LtQ99).unwrap();
        assert_eq!(ltq99.get("1.001", "01", "first"), Some(Outcome::MissingBaseline));
        assert_eq!(report.outcomes.missing_baseline, 4);
    }

    #[test]
    fn cell_outside_array_is_skipped() {
        let ensemble = small_ensemble();
        let network =
            NetworkLookup::from_network_ids(["1.001", "1.007"], &LookupColumns::new()).unwrap();
        let mut baseline = HistoricalBaseline::new();
        baseline.insert(
            "1.001",
            BaselineThresholds {
                very_low: Some(2.0),
                low: Some(5.0),
                high: Some(80.0),
                very_high: Some(1000.0),
            },
        );
        let pipeline = Pipeline::new(&ensemble, &network, &baseline, MetricSelection::default())
            .with_requirement(RunRequirement::climate(90));

        let ramp: Vec<f32> = (1..=90).map(|v| v as f32).collect();
        let mut map = HashMap::new();
        map.insert(
            ("1".to_string(), "01".to_string()),
            FlowArray::from_cells(vec![north_cell(ramp)]).ok(),
        );
        let mut results = pipeline.result_set();
        let report = pipeline.run(&MapSource(map), &mut results, None);

        assert_eq!(report.status_of("1", "01"), Some(&UnitStatus::Processed { cells: 1 }));
        let gt = results.store(Metric::GtQ01).unwrap();
        assert_eq!(gt.get("1.001", "01", "first"), Some(Outcome::Value(0.0)));
        let lt = results.store(Metric::LtQ99).unwrap();
        // One day below 2.0 in a quarter year.
        assert_eq!(lt.get("1.001", "01", "first"), Some(Outcome::Value(4.0)));
        // 90 days is shorter than one annual block.
        let rp = results.store(Metric::ReturnPeriod(10)).unwrap();
        assert_eq!(rp.get("1.001", "01", "first"), Some(Outcome::Degenerate));
        assert_eq!(rp.get("1.007", "01", "first"), None);
    }
}

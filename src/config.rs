use crate::error::{FlowStatsError, FlowStatsResult};
use crate::periods::{Calendar, Period, WarmingLevelTable};
use clap::ValueEnum;
use std::path::{Path, PathBuf};

// Simulation timeline
pub const DAYS_PER_YEAR: usize = 360;
pub const ORIGIN_YEAR: i32 = 1980;
pub const HORIZON_YEARS: usize = 100;
pub const WARMING_WINDOW_YEARS: usize = 30;
pub const CLIMATE_RUN_DAYS: usize = DAYS_PER_YEAR * HORIZON_YEARS;

// Historical reference runs (01/01/1980 - 01/01/2011, 365-day years)
pub const HISTORICAL_EXPECTED_DAYS: usize = 11324;
pub const HISTORICAL_COMPLETE_FRACTION: f64 = 0.9;
pub const HISTORICAL_SPINUP_DAYS: usize = 365 * 5;

pub const DIRECTION_LEAD_STEPS: usize = 1000;
pub const RETURN_PERIODS: [u32; 7] = [2, 3, 5, 10, 25, 50, 100];

// Column mapping for the river network lookup table
#[derive(Debug, Clone)]
pub struct LookupColumns {
    pub network_id: String,
    pub cell_width: usize,
}

impl LookupColumns {
    pub fn new() -> Self {
        LookupColumns {
            network_id: "Network_ID".to_string(),
            cell_width: 3,
        }
    }
}

impl Default for LookupColumns {
    fn default() -> Self {
        Self::new()
    }
}

// Output format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Sqlite,
    Csv,
    Both,
}

impl OutputFormat {
    pub fn writes_sqlite(&self) -> bool {
        matches!(self, OutputFormat::Sqlite | OutputFormat::Both)
    }

    pub fn writes_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }
}

/// Which families of output metric the run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSelection {
    pub flow_stats: bool,
    pub return_periods: bool,
}

impl MetricSelection {
    pub fn is_empty(&self) -> bool {
        !self.flow_stats && !self.return_periods
    }
}

impl Default for MetricSelection {
    fn default() -> Self {
        MetricSelection {
            flow_stats: true,
            return_periods: true,
        }
    }
}

/// Where simulation outputs live on disk.
///
/// Climate runs: `<root>/<prefix><realization>/<catchment>/output_<catchment>_shegraph.h5`
/// Historical runs: `<historical_root>/<catchment>/output_<catchment>_shegraph.h5`
#[derive(Debug, Clone)]
pub struct SimulationLayout {
    pub root: PathBuf,
    pub run_prefix: String,
    pub historical_root: Option<PathBuf>,
}

impl SimulationLayout {
    fn output_file(dir: &Path, catchment: &str) -> PathBuf {
        dir.join(catchment)
            .join(format!("output_{}_shegraph.h5", catchment))
    }

    pub fn climate_run_path(&self, catchment: &str, realization: &str) -> PathBuf {
        let run_dir = self
            .root
            .join(format!("{}{}", self.run_prefix, realization));
        Self::output_file(&run_dir, catchment)
    }

    pub fn historical_run_path(&self, catchment: &str) -> Option<PathBuf> {
        self.historical_root
            .as_ref()
            .map(|root| Self::output_file(root, catchment))
    }
}

/// Realizations and analysis periods of one climate ensemble.
///
/// Warming-level anchor years are indexed by realization position, so the
/// constructor refuses tables whose rows don't line up with `realizations`.
#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    realizations: Vec<String>,
    periods: Vec<Period>,
    calendar: Calendar,
}

impl EnsembleConfig {
    pub fn new(
        realizations: Vec<String>,
        fixed_periods: Vec<(String, usize, usize)>,
        warming: WarmingLevelTable,
    ) -> FlowStatsResult<Self> {
        if realizations.is_empty() {
            return Err(FlowStatsError::Config("realization list is empty".into()));
        }
        warming.check_alignment(&realizations)?;

        let mut periods = Vec::with_capacity(fixed_periods.len() + warming.levels().len());
        for (name, start, end) in fixed_periods {
            if start >= end {
                return Err(FlowStatsError::Config(format!(
                    "fixed period {} has start {} >= end {}",
                    name, start, end
                )));
            }
            periods.push(Period::fixed(name, start, end));
        }
        for (name, anchors) in warming.levels() {
            periods.push(Period::warming_level(name.clone(), anchors.clone()));
        }

        let mut seen = std::collections::HashSet::new();
        for period in &periods {
            if !seen.insert(period.name.as_str()) {
                return Err(FlowStatsError::Config(format!(
                    "duplicate period name {}",
                    period.name
                )));
            }
        }

        Ok(EnsembleConfig {
            realizations,
            periods,
            calendar: Calendar::default(),
        })
    }

    /// The UKCP18 regional ensemble used for the national river network runs.
    pub fn ukcp18() -> FlowStatsResult<Self> {
        Self::ukcp18_with_warming(WarmingLevelTable::ukcp18())
    }

    pub fn ukcp18_with_warming(warming: WarmingLevelTable) -> FlowStatsResult<Self> {
        let y = DAYS_PER_YEAR;
        let fixed = vec![
            ("1985-2000".to_string(), y * 5, y * 20),
            ("1985-2010".to_string(), y * 5, y * 30),
            ("1985-2080".to_string(), y * 5, y * 100),
            ("2010-2040".to_string(), y * 30, y * 60),
            ("2020-2050".to_string(), y * 40, y * 70),
            ("2030-2060".to_string(), y * 50, y * 80),
            ("2040-2070".to_string(), y * 60, y * 90),
            ("2050-2080".to_string(), y * 70, y * 100),
        ];
        Self::new(ukcp18_realizations(), fixed, warming)
    }

    pub fn realizations(&self) -> &[String] {
        &self.realizations
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn period_names(&self) -> Vec<String> {
        self.periods.iter().map(|p| p.name.clone()).collect()
    }
}

pub fn ukcp18_realizations() -> Vec<String> {
    [
        "01", "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "15",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

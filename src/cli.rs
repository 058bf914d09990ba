use clap::{ArgAction, Parser};
use flowstats_rs::config::{MetricSelection, OutputFormat, SimulationLayout};
use std::path::PathBuf;
use tracing::Level;

/// Summarise river-network flow simulations into flow statistics and
/// return-period flows per river cell, realization and analysis period.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// River network lookup table (CSV with a Network_ID column)
    pub lookup: PathBuf,

    /// Directory holding one run directory per realization
    pub simulation_root: PathBuf,

    /// Prefix of the per-realization run directories
    #[arg(long, default_value = "bcm_")]
    pub run_prefix: String,

    /// Historical reference runs used to derive exceedance thresholds
    #[arg(long)]
    pub historical_root: Option<PathBuf>,

    /// Precomputed thresholds (network_id,q99,q95,q05,q01); overrides --historical-root
    #[arg(long)]
    pub baseline: Option<PathBuf>,

    /// Warming-level anchor years (realization,WL1.5,...); defaults to the UKCP18 table
    #[arg(long)]
    pub warming_levels: Option<PathBuf>,

    /// Where result workbooks are written
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// File name prefix of the result workbooks
    #[arg(long, default_value = "UKCP18rcm")]
    pub root_name: String,

    /// Sheet (model configuration) the results are written to
    #[arg(long, default_value = "SHETRAN-UK")]
    pub sheet: String,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Sqlite)]
    pub format: OutputFormat,

    /// Skip quantiles and exceedance rates
    #[arg(long)]
    pub no_flow_stats: bool,

    /// Skip return-period flows
    #[arg(long)]
    pub no_return_periods: bool,

    /// Worker threads
    #[arg(short, long, default_value_t = num_cpus::get())]
    pub jobs: usize,

    /// Only process these catchments (repeatable)
    #[arg(long = "catchment")]
    pub catchments: Vec<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn selection(&self) -> MetricSelection {
        MetricSelection {
            flow_stats: !self.no_flow_stats,
            return_periods: !self.no_return_periods,
        }
    }

    pub fn layout(&self) -> SimulationLayout {
        SimulationLayout {
            root: self.simulation_root.clone(),
            run_prefix: self.run_prefix.clone(),
            historical_root: self.historical_root.clone(),
        }
    }

    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::WARN;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

pub fn get_args() -> Args {
    Args::parse()
}

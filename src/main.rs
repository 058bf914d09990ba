use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{info, warn};

mod cli;

use cli::get_args;
use flowstats_rs::baseline::HistoricalBaseline;
use flowstats_rs::config::{EnsembleConfig, LookupColumns};
use flowstats_rs::io::csv::{load_baseline, load_network_lookup, load_warming_levels, write_wide_table};
use flowstats_rs::io::netcdf::ShegraphSource;
use flowstats_rs::io::workbook::persist_store;
use flowstats_rs::pipeline::Pipeline;
use flowstats_rs::store::ResultStore;

fn main() -> Result<()> {
    let args = get_args();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .init();

    let selection = args.selection();
    if selection.is_empty() {
        warn!("Both --no-flow-stats and --no-return-periods given; no metric will be written");
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.jobs)
        .build_global()
        .context("Failed to build worker pool")?;

    // River network
    let columns = LookupColumns::new();
    let mut network = load_network_lookup(&args.lookup, &columns)
        .with_context(|| format!("Failed to load network lookup: {:?}", args.lookup))?;
    if !args.catchments.is_empty() {
        network.retain_catchments(&args.catchments);
        info!("Restricted to {} catchments", network.catchments().len());
    }

    // Ensemble and periods
    let ensemble = match &args.warming_levels {
        Some(path) => {
            let table = load_warming_levels(path)
                .with_context(|| format!("Failed to load warming levels: {:?}", path))?;
            EnsembleConfig::ukcp18_with_warming(table)?
        }
        None => EnsembleConfig::ukcp18()?,
    };

    // Historical thresholds
    let source = ShegraphSource::new(args.layout());
    let baseline = if let Some(path) = &args.baseline {
        load_baseline(path, &columns)
            .with_context(|| format!("Failed to load baseline thresholds: {:?}", path))?
    } else if args.historical_root.is_some() {
        info!("Computing historical thresholds from reference runs...");
        HistoricalBaseline::from_reference_runs(&source, &network)
    } else {
        warn!("No historical baseline given; exceedance rates will be reported as missing");
        HistoricalBaseline::new()
    };

    info!("Run configuration:");
    info!("  Catchments: {}", network.catchments().len());
    info!("  River cells: {}", network.cells().len());
    info!("  Realizations: {}", ensemble.realizations().join(", "));
    info!("  Periods: {}", ensemble.period_names().join(", "));
    info!("  Worker threads: {}", args.jobs);

    let pipeline = Pipeline::new(&ensemble, &network, &baseline, selection);
    let mut results = pipeline.result_set();

    let pb = ProgressBar::new(network.catchments().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} catchments ({eta})")?
            .progress_chars("#>-"),
    );

    let report = pipeline.run(&source, &mut results, Some(&pb));
    pb.finish_and_clear();
    report.log_summary();

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output_dir))?;
    for store in results.stores_mut() {
        if args.format.writes_sqlite() {
            let path = persist_store(&args.output_dir, &args.root_name, &args.sheet, store)
                .with_context(|| format!("Failed to write workbook for {}", store.metric()))?;
            info!("{} saved to {:?} (sheet {})", store.metric(), path, args.sheet);
        }
        if args.format.writes_csv() {
            write_csv_export(&args.output_dir, &args.root_name, &args.sheet, store)?;
        }
    }

    info!("Flow statistics complete.");
    Ok(())
}

fn write_csv_export(dir: &Path, root_name: &str, sheet: &str, store: &ResultStore) -> Result<()> {
    let path = dir.join(format!("{}_RiverNet_{}_{}.csv", root_name, store.metric(), sheet));
    write_wide_table(&path, store).with_context(|| format!("Failed to write {:?}", path))?;
    info!("{} saved to {:?}", store.metric(), path);
    Ok(())
}

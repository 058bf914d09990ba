use crate::baseline::{BaselineThresholds, HistoricalBaseline};
use crate::config::LookupColumns;
use crate::error::{FlowStatsError, FlowStatsResult};
use crate::network::{NetworkLookup, RiverCell};
use crate::periods::WarmingLevelTable;
use crate::store::ResultStore;
use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

fn open_reader(path: &Path) -> FlowStatsResult<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

// Load the river network lookup; the id column falls back to the first column
pub fn load_network_lookup(path: &Path, columns: &LookupColumns) -> FlowStatsResult<NetworkLookup> {
    let mut rdr = open_reader(path)?;
    let id_index = rdr
        .headers()?
        .iter()
        .position(|h| h == columns.network_id)
        .unwrap_or(0);

    let mut ids = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if let Some(id) = record.get(id_index) {
            if !id.is_empty() {
                ids.push(id.to_string());
            }
        }
    }
    NetworkLookup::from_network_ids(ids, columns)
}

#[derive(Debug, Deserialize)]
struct BaselineRecord {
    network_id: String,
    q99: Option<f64>,
    q95: Option<f64>,
    q05: Option<f64>,
    q01: Option<f64>,
}

/// Read `network_id,q99,q95,q05,q01`; empty fields are missing thresholds.
pub fn load_baseline(path: &Path, columns: &LookupColumns) -> FlowStatsResult<HistoricalBaseline> {
    let mut rdr = open_reader(path)?;
    let mut baseline = HistoricalBaseline::new();
    for result in rdr.deserialize() {
        let record: BaselineRecord = result?;
        let cell = match RiverCell::parse(&record.network_id, columns.cell_width) {
            Ok(cell) => cell,
            Err(e) => {
                warn!("Skipping baseline row: {}", e);
                continue;
            }
        };
        baseline.insert(
            cell.network_id(),
            BaselineThresholds {
                very_low: record.q99,
                low: record.q95,
                high: record.q05,
                very_high: record.q01,
            },
        );
    }
    info!("Loaded historical thresholds for {} cells", baseline.len());
    Ok(baseline)
}

/// Read a warming-level table with one row per realization:
/// `realization,WL1.5,WL2.0,...` holding the anchor year of each level.
pub fn load_warming_levels(path: &Path) -> FlowStatsResult<WarmingLevelTable> {
    let mut rdr = open_reader(path)?;
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err(FlowStatsError::Config(format!(
            "warming-level table {:?} has no level columns",
            path
        )));
    }
    let level_names: Vec<String> = headers.iter().skip(1).map(String::from).collect();
    let mut realizations = Vec::new();
    let mut anchors: Vec<Vec<i32>> = vec![Vec::new(); level_names.len()];

    for result in rdr.records() {
        let record = result?;
        let Some(realization) = record.get(0) else {
            continue;
        };
        realizations.push(realization.to_string());
        for (i, years) in anchors.iter_mut().enumerate() {
            let field = record.get(i + 1).unwrap_or("");
            let year = field.parse::<i32>().map_err(|_| {
                FlowStatsError::Config(format!(
                    "warming level {} for realization {} is not a year: '{}'",
                    level_names[i], realization, field
                ))
            })?;
            years.push(year);
        }
    }

    Ok(WarmingLevelTable::new(
        Some(realizations),
        level_names.into_iter().zip(anchors).collect(),
    ))
}

/// Write one metric as a wide table: two header rows (realization, period)
/// across the full cross product, one row per entity, blank where missing.
pub fn write_wide_table(path: &Path, store: &ResultStore) -> FlowStatsResult<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;

    let columns: Vec<(&str, &str)> = store.columns().collect();
    let mut realization_row = vec!["Network_id"];
    realization_row.extend(columns.iter().map(|(r, _)| *r));
    wtr.write_record(&realization_row)?;
    let mut period_row = vec![""];
    period_row.extend(columns.iter().map(|(_, p)| *p));
    wtr.write_record(&period_row)?;

    for (entity, row) in store.rows() {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(entity.to_string());
        record.extend(row.iter().map(|cell| {
            cell.and_then(|o| o.value())
                .map(|v| v.to_string())
                .unwrap_or_default()
        }));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

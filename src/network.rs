use crate::config::LookupColumns;
use crate::error::{FlowStatsError, FlowStatsResult};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

// A river cell within one catchment's simulation grid
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RiverCell {
    pub catchment_id: String,
    pub cell_id: String,
}

impl RiverCell {
    /// Parse `catchment.cell`, restoring trailing zeros on the cell part that
    /// were lost when the id went through a float column (`1001.01` -> `1001.010`).
    pub fn parse(network_id: &str, cell_width: usize) -> FlowStatsResult<Self> {
        let (catchment, cell) =
            network_id
                .trim()
                .split_once('.')
                .ok_or_else(|| FlowStatsError::BadNetworkId {
                    id: network_id.to_string(),
                    reason: "missing '.' separator",
                })?;
        if catchment.is_empty() || cell.is_empty() {
            return Err(FlowStatsError::BadNetworkId {
                id: network_id.to_string(),
                reason: "empty catchment or cell part",
            });
        }
        if !cell.chars().all(|c| c.is_ascii_digit()) {
            return Err(FlowStatsError::BadNetworkId {
                id: network_id.to_string(),
                reason: "cell part is not numeric",
            });
        }

        let mut cell_id = cell.to_string();
        while cell_id.len() < cell_width {
            cell_id.push('0');
        }

        Ok(RiverCell {
            catchment_id: catchment.to_string(),
            cell_id,
        })
    }

    pub fn network_id(&self) -> String {
        format!("{}.{}", self.catchment_id, self.cell_id)
    }

    /// Zero-based row of this cell in the catchment's flow array.
    pub fn cell_index(&self) -> FlowStatsResult<usize> {
        let number: usize = self
            .cell_id
            .parse()
            .map_err(|_| FlowStatsError::BadNetworkId {
                id: self.network_id(),
                reason: "cell part is not numeric",
            })?;
        number.checked_sub(1).ok_or(FlowStatsError::BadNetworkId {
            id: self.network_id(),
            reason: "cell numbers start at 1",
        })
    }
}

// The national river network, grouped by catchment
#[derive(Debug, Clone, Default)]
pub struct NetworkLookup {
    cells: Vec<RiverCell>,
    catchments: Vec<String>,
    by_catchment: BTreeMap<String, Vec<usize>>,
}

impl NetworkLookup {
    pub fn new() -> Self {
        NetworkLookup::default()
    }

    /// Add a cell; returns false if the network id was already present.
    pub fn add_cell(&mut self, cell: RiverCell, seen: &mut HashSet<String>) -> bool {
        if !seen.insert(cell.network_id()) {
            return false;
        }
        let idx = self.cells.len();
        let entry = self
            .by_catchment
            .entry(cell.catchment_id.clone())
            .or_default();
        if entry.is_empty() {
            self.catchments.push(cell.catchment_id.clone());
        }
        entry.push(idx);
        self.cells.push(cell);
        true
    }

    pub fn from_network_ids<I, S>(ids: I, columns: &LookupColumns) -> FlowStatsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lookup = NetworkLookup::new();
        let mut seen = HashSet::new();
        let mut duplicates = 0;
        for id in ids {
            let cell = RiverCell::parse(id.as_ref(), columns.cell_width)?;
            if !lookup.add_cell(cell, &mut seen) {
                debug!("Dropping duplicate network id {}", id.as_ref());
                duplicates += 1;
            }
        }
        info!(
            "River network loaded with {} cells in {} catchments ({} duplicates dropped)",
            lookup.cells.len(),
            lookup.catchments.len(),
            duplicates
        );
        Ok(lookup)
    }

    pub fn cells(&self) -> &[RiverCell] {
        &self.cells
    }

    /// Catchment ids in first-seen order.
    pub fn catchments(&self) -> &[String] {
        &self.catchments
    }

    /// Positions in `cells()` of one catchment's cells.
    pub fn cell_indices(&self, catchment: &str) -> &[usize] {
        self.by_catchment
            .get(catchment)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn cells_in(&self, catchment: &str) -> impl Iterator<Item = &RiverCell> {
        self.cell_indices(catchment).iter().map(|&i| &self.cells[i])
    }

    pub fn network_ids(&self) -> Vec<String> {
        self.cells.iter().map(RiverCell::network_id).collect()
    }

    /// Keep only the listed catchments (no-op for an empty filter).
    pub fn retain_catchments(&mut self, keep: &[String]) {
        if keep.is_empty() {
            return;
        }
        let mut filtered = NetworkLookup::new();
        let mut seen = HashSet::new();
        for cell in self.cells.iter().filter(|c| keep.contains(&c.catchment_id)) {
            filtered.add_cell(cell.clone(), &mut seen);
        }
        *self = filtered;
    }
}

use crate::config::SimulationLayout;
use crate::error::{FlowStatsError, FlowStatsResult};
use crate::flows::{FlowArray, FlowSource};
use std::path::Path;
use tracing::debug;

const VARIABLES_GROUP: &str = "VARIABLES";
const FLOW_KEY: &str = "ovr_flow";
const VALUE_DATASET: &str = "value";

/// Read the overland-flow dataset of a shegraph output file.
///
/// The file is HDF5; the flow lives at `VARIABLES/<n ovr_flow>/value` with
/// shape `[cell, 4, timestep]`. The group name carries a numeric prefix that
/// differs between model builds, so it is matched on the `ovr_flow` suffix.
pub fn read_flow_array(path: &Path) -> FlowStatsResult<FlowArray> {
    let file = netcdf::open(path)?;
    let missing = || FlowStatsError::MissingFlowVariable {
        path: path.to_path_buf(),
    };

    let variables = file.group(VARIABLES_GROUP)?.ok_or_else(missing)?;
    let flow_group = variables
        .groups()
        .find(|g| g.name().contains(FLOW_KEY))
        .ok_or_else(missing)?;
    let var = flow_group.variable(VALUE_DATASET).ok_or_else(missing)?;

    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let data = var.get_values::<f32, _>(..)?;
    debug!("Read flow array {:?} from {:?}", shape, path);
    FlowArray::new(data, &shape)
}

/// Flow arrays read from shegraph files laid out per `SimulationLayout`.
#[derive(Debug, Clone)]
pub struct ShegraphSource {
    layout: SimulationLayout,
}

impl ShegraphSource {
    pub fn new(layout: SimulationLayout) -> Self {
        ShegraphSource { layout }
    }

    fn read_if_present(path: &Path) -> FlowStatsResult<Option<FlowArray>> {
        if !path.is_file() {
            return Ok(None);
        }
        read_flow_array(path).map(Some)
    }
}

impl FlowSource for ShegraphSource {
    fn load(&self, catchment: &str, realization: &str) -> FlowStatsResult<Option<FlowArray>> {
        Self::read_if_present(&self.layout.climate_run_path(catchment, realization))
    }

    fn load_historical(&self, catchment: &str) -> FlowStatsResult<Option<FlowArray>> {
        match self.layout.historical_run_path(catchment) {
            Some(path) => Self::read_if_present(&path),
            None => Ok(None),
        }
    }
}

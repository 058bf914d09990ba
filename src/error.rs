use std::path::PathBuf;
use thiserror::Error;

pub type FlowStatsResult<T> = Result<T, FlowStatsError>;

#[derive(Error, Debug)]
pub enum FlowStatsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No 'ovr_flow' variable found in {path:?}")]
    MissingFlowVariable { path: PathBuf },

    #[error("Flow array has unexpected shape {shape:?} (expected [cell, 4, timestep])")]
    BadShape { shape: Vec<usize> },

    #[error("Malformed network id '{id}': {reason}")]
    BadNetworkId { id: String, reason: &'static str },

    #[error("River cell {cell} is outside the flow array ({cells} cells)")]
    CellOutOfRange { cell: usize, cells: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

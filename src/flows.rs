use crate::error::{FlowStatsError, FlowStatsResult};

pub const CHANNELS: usize = 4;

/// Overland flow for every cell of one (catchment, realization) run, laid out
/// `[cell, channel, timestep]` with channels ordered north, east, south, west.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowArray {
    data: Vec<f32>,
    cells: usize,
    timesteps: usize,
}

impl FlowArray {
    pub fn new(data: Vec<f32>, shape: &[usize]) -> FlowStatsResult<Self> {
        match shape {
            [cells, CHANNELS, timesteps] if cells * CHANNELS * timesteps == data.len() => {
                Ok(FlowArray {
                    data,
                    cells: *cells,
                    timesteps: *timesteps,
                })
            }
            _ => Err(FlowStatsError::BadShape {
                shape: shape.to_vec(),
            }),
        }
    }

    /// Build an array from per-cell channel series; every series must share
    /// one length.
    pub fn from_cells(cells: Vec<[Vec<f32>; CHANNELS]>) -> FlowStatsResult<Self> {
        let timesteps = cells.first().map(|c| c[0].len()).unwrap_or(0);
        let mut data = Vec::with_capacity(cells.len() * CHANNELS * timesteps);
        for channels in &cells {
            for series in channels {
                if series.len() != timesteps {
                    return Err(FlowStatsError::BadShape {
                        shape: vec![cells.len(), CHANNELS, series.len()],
                    });
                }
                data.extend_from_slice(series);
            }
        }
        FlowArray::new(data, &[cells.len(), CHANNELS, timesteps])
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    pub fn cell(&self, cell: usize) -> FlowStatsResult<CellSeries<'_>> {
        if cell >= self.cells {
            return Err(FlowStatsError::CellOutOfRange {
                cell,
                cells: self.cells,
            });
        }
        let stride = CHANNELS * self.timesteps;
        let block = &self.data[cell * stride..(cell + 1) * stride];
        Ok(CellSeries {
            block,
            timesteps: self.timesteps,
        })
    }

    /// Drop every timestep at or past `timesteps`.
    pub fn truncate(&mut self, timesteps: usize) {
        if timesteps >= self.timesteps {
            return;
        }
        let mut data = Vec::with_capacity(self.cells * CHANNELS * timesteps);
        for row in self.data.chunks_exact(self.timesteps) {
            data.extend_from_slice(&row[..timesteps]);
        }
        self.data = data;
        self.timesteps = timesteps;
    }
}

/// The four directional channels of a single river cell.
#[derive(Debug, Clone, Copy)]
pub struct CellSeries<'a> {
    block: &'a [f32],
    timesteps: usize,
}

impl<'a> CellSeries<'a> {
    pub fn channel(&self, channel: usize) -> &'a [f32] {
        &self.block[channel * self.timesteps..(channel + 1) * self.timesteps]
    }

    pub fn len(&self) -> usize {
        self.timesteps
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps == 0
    }
}

/// Minimum length a run must reach to be analysed, and the length it is cut
/// back to afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRequirement {
    pub min_timesteps: usize,
    pub keep_timesteps: Option<usize>,
}

impl RunRequirement {
    /// 100-year climate runs. Some runs were written with 365-day years; the
    /// tail past 36000 days has no driving data and is discarded.
    pub fn climate(days: usize) -> Self {
        RunRequirement {
            min_timesteps: days,
            keep_timesteps: Some(days),
        }
    }

    /// Historical runs are accepted when at least `fraction` of the expected
    /// length was simulated.
    pub fn historical(expected: usize, fraction: f64) -> Self {
        RunRequirement {
            min_timesteps: (expected as f64 * fraction).ceil() as usize,
            keep_timesteps: None,
        }
    }

    pub fn is_complete(&self, array: &FlowArray) -> bool {
        array.timesteps() >= self.min_timesteps
    }

    /// Returns the trimmed array, or `None` for an incomplete run.
    pub fn apply(&self, mut array: FlowArray) -> Option<FlowArray> {
        if !self.is_complete(&array) {
            return None;
        }
        if let Some(keep) = self.keep_timesteps {
            array.truncate(keep);
        }
        Some(array)
    }
}

/// Supplies flow arrays per catchment and realization.
///
/// `Ok(None)` means no output exists for that key, which is expected for
/// catchments without a finished simulation.
pub trait FlowSource: Sync {
    fn load(&self, catchment: &str, realization: &str) -> FlowStatsResult<Option<FlowArray>>;

    fn load_historical(&self, _catchment: &str) -> FlowStatsResult<Option<FlowArray>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cell_array(timesteps: usize) -> FlowArray {
        let cell = |base: f32| {
            [
                (0..timesteps).map(|t| base + t as f32).collect::<Vec<_>>(),
                vec![base + 0.5; timesteps],
                vec![0.0; timesteps],
                vec![-base; timesteps],
            ]
        };
        FlowArray::from_cells(vec![cell(1.0), cell(10.0)]).unwrap()
    }

    #[test]
    fn channels_are_addressed_by_cell() {
        let array = two_cell_array(5);
        assert_eq!(array.cells(), 2);
        let second = array.cell(1).unwrap();
        assert_eq!(second.channel(0), &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_eq!(second.channel(3), &[-10.0; 5]);
        assert!(array.cell(2).is_err());
    }

    #[test]
    fn shape_must_match_data() {
        assert!(FlowArray::new(vec![0.0; 12], &[1, 4, 3]).is_ok());
        assert!(FlowArray::new(vec![0.0; 12], &[1, 3, 4]).is_err());
        assert!(FlowArray::new(vec![0.0; 11], &[1, 4, 3]).is_err());
    }

    #[test]
    fn truncate_keeps_leading_steps() {
        let mut array = two_cell_array(6);
        array.truncate(4);
        assert_eq!(array.timesteps(), 4);
        assert_eq!(array.cell(1).unwrap().channel(0), &[10.0, 11.0, 12.0, 13.0]);
        assert_eq!(array.cell(0).unwrap().channel(1), &[1.5; 4]);
    }

    #[test]
    fn climate_requirement_skips_short_runs_and_trims_long_ones() {
        let req = RunRequirement::climate(5);
        assert!(req.apply(two_cell_array(4)).is_none());
        let trimmed = req.apply(two_cell_array(7)).unwrap();
        assert_eq!(trimmed.timesteps(), 5);
    }

    #[test]
    fn historical_requirement_allows_ten_percent_shortfall() {
        let req = RunRequirement::historical(11324, 0.9);
        assert_eq!(req.min_timesteps, 10192);
        assert_eq!(req.keep_timesteps, None);
    }
}

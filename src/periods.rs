// Analysis periods and their translation into day-index windows.
//
// The simulation timeline is day-indexed from 1 December of the origin year
// using 360-day climate years. Fixed periods carry absolute day offsets;
// warming-level periods carry one anchor year per realization and always
// span 30 years from the start of that year, cut at the 100-year horizon.

use crate::config::{
    DAYS_PER_YEAR, HORIZON_YEARS, ORIGIN_YEAR, WARMING_WINDOW_YEARS, ukcp18_realizations,
};
use crate::error::{FlowStatsError, FlowStatsResult};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    pub origin_year: i32,
    pub days_per_year: usize,
    pub horizon_years: usize,
    pub warming_window_years: usize,
}

impl Calendar {
    pub fn horizon_days(&self) -> usize {
        self.days_per_year * self.horizon_years
    }

    /// First day index of `year`, or `None` when the year precedes the origin.
    pub fn year_start(&self, year: i32) -> Option<usize> {
        let offset = year.checked_sub(self.origin_year)?;
        usize::try_from(offset)
            .ok()
            .map(|years| years * self.days_per_year)
    }
}

impl Default for Calendar {
    fn default() -> Self {
        Calendar {
            origin_year: ORIGIN_YEAR,
            days_per_year: DAYS_PER_YEAR,
            horizon_years: HORIZON_YEARS,
            warming_window_years: WARMING_WINDOW_YEARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodKind {
    Fixed { start: usize, end: usize },
    WarmingLevel { anchor_years: Vec<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub name: String,
    pub kind: PeriodKind,
}

/// Half-open `[start, end)` range of day indices. Empty means no statistic
/// can be computed for the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub const EMPTY: Window = Window { start: 0, end: 0 };

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end.max(self.start)
    }

    pub fn years(&self, days_per_year: usize) -> f64 {
        self.len() as f64 / days_per_year as f64
    }

    fn capped(start: usize, end: usize, limit: usize) -> Window {
        let end = end.min(limit);
        if start >= end {
            Window::EMPTY
        } else {
            Window { start, end }
        }
    }
}

impl Period {
    pub fn fixed(name: impl Into<String>, start: usize, end: usize) -> Self {
        Period {
            name: name.into(),
            kind: PeriodKind::Fixed { start, end },
        }
    }

    pub fn warming_level(name: impl Into<String>, anchor_years: Vec<i32>) -> Self {
        Period {
            name: name.into(),
            kind: PeriodKind::WarmingLevel { anchor_years },
        }
    }

    pub fn is_warming_level(&self) -> bool {
        matches!(self.kind, PeriodKind::WarmingLevel { .. })
    }

    /// Resolve this period for one realization against a series of
    /// `series_len` timesteps. The result never runs past the series or the
    /// calendar horizon.
    pub fn window(&self, realization: usize, series_len: usize, calendar: &Calendar) -> Window {
        let limit = series_len.min(calendar.horizon_days());
        match &self.kind {
            PeriodKind::Fixed { start, end } => Window::capped(*start, *end, limit),
            PeriodKind::WarmingLevel { anchor_years } => {
                let Some(&anchor) = anchor_years.get(realization) else {
                    return Window::EMPTY;
                };
                // Anchors before the origin start at day zero.
                let start = calendar.year_start(anchor).unwrap_or(0);
                let end = start + calendar.warming_window_years * calendar.days_per_year;
                Window::capped(start, end, limit)
            }
        }
    }
}

/// Per-realization anchor years for each warming level, in realization order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmingLevelTable {
    realizations: Option<Vec<String>>,
    levels: Vec<(String, Vec<i32>)>,
}

impl WarmingLevelTable {
    /// `realizations` carries the row labels when the table came from a file,
    /// so the ordering can be checked against the flow-series realizations.
    pub fn new(realizations: Option<Vec<String>>, levels: Vec<(String, Vec<i32>)>) -> Self {
        WarmingLevelTable {
            realizations,
            levels,
        }
    }

    pub fn levels(&self) -> &[(String, Vec<i32>)] {
        &self.levels
    }

    pub fn check_alignment(&self, realizations: &[String]) -> FlowStatsResult<()> {
        if let Some(labels) = &self.realizations {
            if labels.as_slice() != realizations {
                return Err(FlowStatsError::Config(format!(
                    "warming-level realizations {:?} do not match ensemble order {:?}",
                    labels, realizations
                )));
            }
        }
        for (name, anchors) in &self.levels {
            if anchors.len() != realizations.len() {
                return Err(FlowStatsError::Config(format!(
                    "warming level {} has {} anchor years for {} realizations",
                    name,
                    anchors.len(),
                    realizations.len()
                )));
            }
        }
        Ok(())
    }

    /// Years in which each UKCP18 RCM member first reaches the warming level.
    pub fn ukcp18() -> Self {
        let levels = vec![
            ("WL1.5", [2006, 2003, 2007, 2005, 2005, 2006, 2004, 2008, 2004, 2010, 2005, 2006]),
            ("WL2.0", [2016, 2013, 2018, 2016, 2017, 2018, 2014, 2018, 2015, 2020, 2016, 2019]),
            ("WL2.5", [2026, 2023, 2028, 2025, 2027, 2029, 2023, 2027, 2025, 2030, 2026, 2030]),
            ("WL3.0", [2034, 2031, 2037, 2034, 2036, 2038, 2030, 2036, 2034, 2038, 2035, 2038]),
            ("WL3.5", [2042, 2039, 2044, 2042, 2043, 2047, 2037, 2045, 2042, 2045, 2043, 2046]),
            ("WL4.0", [2049, 2046, 2051, 2049, 2050, 2055, 2044, 2052, 2050, 2052, 2050, 2054]),
        ];
        WarmingLevelTable {
            realizations: Some(ukcp18_realizations()),
            levels: levels
                .into_iter()
                .map(|(name, years)| (name.to_string(), years.to_vec()))
                .collect(),
        }
    }
}

// Per-metric result tables keyed by (entity, realization, period).

use crate::config::{MetricSelection, RETURN_PERIODS};
use crate::stats::Outcome;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Q99,
    Q95,
    Q50,
    Q05,
    Q01,
    LtQ99,
    LtQ95,
    GtQ05,
    GtQ01,
    ReturnPeriod(u32),
}

impl Metric {
    /// In the order `flow_quantiles` reports them.
    pub const QUANTILES: [Metric; 5] = [Metric::Q99, Metric::Q95, Metric::Q50, Metric::Q05, Metric::Q01];
    /// In the order `ExceedanceCounter::rates` reports them.
    pub const EXCEEDANCES: [Metric; 4] = [Metric::LtQ99, Metric::LtQ95, Metric::GtQ05, Metric::GtQ01];

    pub fn selected(selection: &MetricSelection) -> Vec<Metric> {
        let mut metrics = Vec::new();
        if selection.flow_stats {
            metrics.extend(Self::QUANTILES);
            metrics.extend(Self::EXCEEDANCES);
        }
        if selection.return_periods {
            metrics.extend(RETURN_PERIODS.iter().map(|&t| Metric::ReturnPeriod(t)));
        }
        metrics
    }

    pub fn name(&self) -> String {
        match self {
            Metric::Q99 => "Q99".into(),
            Metric::Q95 => "Q95".into(),
            Metric::Q50 => "Q50".into(),
            Metric::Q05 => "Q05".into(),
            Metric::Q01 => "Q01".into(),
            Metric::LtQ99 => "LTQ99".into(),
            Metric::LtQ95 => "LTQ95".into(),
            Metric::GtQ05 => "GTQ05".into(),
            Metric::GtQ01 => "GTQ01".into(),
            Metric::ReturnPeriod(t) => format!("ReturnPeriod_{}yr", t),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub entity: String,
    pub realization: String,
    pub period: String,
}

impl CellKey {
    pub fn new(entity: &str, realization: &str, period: &str) -> Self {
        CellKey {
            entity: entity.to_string(),
            realization: realization.to_string(),
            period: period.to_string(),
        }
    }
}

// One metric's table, stored densely: one row per entity, one slot per
// (realization, period) column, realization-major. A slot holds at most one
// outcome and the last write wins.
#[derive(Debug, Clone)]
pub struct ResultStore {
    metric: Metric,
    entities: Vec<String>,
    entity_index: HashMap<String, usize>,
    realizations: Vec<String>,
    periods: Vec<String>,
    cells: Vec<Option<Outcome>>,
    // entity x realization: units this run attempted, stored or not
    attempted: Vec<bool>,
}

impl ResultStore {
    pub fn new(
        metric: Metric,
        entities: &[String],
        realizations: &[String],
        periods: &[String],
    ) -> Self {
        let mut store = ResultStore {
            metric,
            entities: Vec::with_capacity(entities.len()),
            entity_index: HashMap::with_capacity(entities.len()),
            realizations: realizations.to_vec(),
            periods: periods.to_vec(),
            cells: Vec::new(),
            attempted: Vec::new(),
        };
        for entity in entities {
            store.entity_row(entity);
        }
        store
    }

    fn width(&self) -> usize {
        self.realizations.len() * self.periods.len()
    }

    // Row of `entity`, appending an empty row if it is new.
    fn entity_row(&mut self, entity: &str) -> usize {
        if let Some(&row) = self.entity_index.get(entity) {
            return row;
        }
        let row = self.entities.len();
        self.entities.push(entity.to_string());
        self.entity_index.insert(entity.to_string(), row);
        self.cells.resize(self.cells.len() + self.width(), None);
        self.attempted
            .resize(self.attempted.len() + self.realizations.len(), false);
        row
    }

    fn column(&self, realization: &str, period: &str) -> Option<usize> {
        let r = self.realizations.iter().position(|x| x == realization)?;
        let p = self.periods.iter().position(|x| x == period)?;
        Some(r * self.periods.len() + p)
    }

    // Copy every row into a wider layout; existing names keep their order.
    fn relayout(&mut self, realizations: Vec<String>, periods: Vec<String>) {
        let (old_r, old_p) = (self.realizations.len(), self.periods.len());
        let (new_r, new_p) = (realizations.len(), periods.len());
        let rows = self.entities.len();
        let mut cells = vec![None; rows * new_r * new_p];
        let mut attempted = vec![false; rows * new_r];
        for row in 0..rows {
            for r in 0..old_r {
                attempted[row * new_r + r] = self.attempted[row * old_r + r];
                for p in 0..old_p {
                    cells[(row * new_r + r) * new_p + p] = self.cells[(row * old_r + r) * old_p + p];
                }
            }
        }
        self.realizations = realizations;
        self.periods = periods;
        self.cells = cells;
        self.attempted = attempted;
    }

    fn realization_or_insert(&mut self, realization: &str) -> usize {
        if let Some(r) = self.realizations.iter().position(|x| x == realization) {
            return r;
        }
        let mut realizations = self.realizations.clone();
        realizations.push(realization.to_string());
        self.relayout(realizations, self.periods.clone());
        self.realizations.len() - 1
    }

    fn period_or_insert(&mut self, period: &str) -> usize {
        if let Some(p) = self.periods.iter().position(|x| x == period) {
            return p;
        }
        let mut periods = self.periods.clone();
        periods.push(period.to_string());
        self.relayout(self.realizations.clone(), periods);
        self.periods.len() - 1
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// Every (realization, period) column, realization-major.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.realizations.iter().flat_map(move |r| {
            self.periods
                .iter()
                .map(move |p| (r.as_str(), p.as_str()))
        })
    }

    pub fn get(&self, entity: &str, realization: &str, period: &str) -> Option<Outcome> {
        let row = *self.entity_index.get(entity)?;
        let col = self.column(realization, period)?;
        self.cells[row * self.width() + col]
    }

    pub fn set(&mut self, entity: &str, realization: &str, period: &str, outcome: Outcome) {
        let row = self.entity_row(entity);
        let r = self.realization_or_insert(realization);
        let p = self.period_or_insert(period);
        let width = self.width();
        self.cells[row * width + r * self.periods.len() + p] = Some(outcome);
    }

    /// Record that this run processed (or tried to process) `entity` for
    /// `realization`. Persisted cells of attempted units are never restored,
    /// so a unit that now has no output comes back empty.
    pub fn mark_attempted(&mut self, entity: &str, realization: &str) {
        let row = self.entity_row(entity);
        let r = self.realization_or_insert(realization);
        let n = self.realizations.len();
        self.attempted[row * n + r] = true;
    }

    pub fn was_attempted(&self, entity: &str, realization: &str) -> bool {
        let Some(&row) = self.entity_index.get(entity) else {
            return false;
        };
        let Some(r) = self.realizations.iter().position(|x| x == realization) else {
            return false;
        };
        self.attempted[row * self.realizations.len() + r]
    }

    pub fn len(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Fold in rows from a previously persisted table. Cells written during
    /// this run keep their new values and cells of units this run attempted
    /// stay as this run left them; every other cell is restored, so a run
    /// restricted to some catchments never erases the rest.
    /// Returns the number of cells taken from `persisted`.
    pub fn merge_from_persisted<I>(&mut self, persisted: I) -> usize
    where
        I: IntoIterator<Item = (CellKey, Outcome)>,
    {
        let mut restored = 0;
        for (key, outcome) in persisted {
            if self.was_attempted(&key.entity, &key.realization)
                || self.get(&key.entity, &key.realization, &key.period).is_some()
            {
                continue;
            }
            self.set(&key.entity, &key.realization, &key.period, outcome);
            restored += 1;
        }
        restored
    }

    /// Rows in entity order, each spanning the full cross product with
    /// `None` where no outcome was stored.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Option<Outcome>])> {
        let width = self.width();
        self.entities.iter().enumerate().map(move |(row, entity)| {
            (entity.as_str(), &self.cells[row * width..(row + 1) * width])
        })
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for outcome in self.cells.iter().flatten() {
            counts.add(*outcome);
        }
        counts
    }
}

/// Tallies of stored outcomes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub values: usize,
    pub degenerate: usize,
    pub fit_failed: usize,
    pub missing_baseline: usize,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Value(_) => self.values += 1,
            Outcome::Degenerate => self.degenerate += 1,
            Outcome::FitFailed => self.fit_failed += 1,
            Outcome::MissingBaseline => self.missing_baseline += 1,
        }
    }
}

/// One `ResultStore` per selected metric.
#[derive(Debug, Clone)]
pub struct ResultSet {
    stores: BTreeMap<Metric, ResultStore>,
}

impl ResultSet {
    pub fn new(
        metrics: &[Metric],
        entities: &[String],
        realizations: &[String],
        periods: &[String],
    ) -> Self {
        let stores = metrics
            .iter()
            .map(|&m| (m, ResultStore::new(m, entities, realizations, periods)))
            .collect();
        ResultSet { stores }
    }

    /// Writes to metrics that weren't selected are dropped.
    pub fn set(
        &mut self,
        metric: Metric,
        entity: &str,
        realization: &str,
        period: &str,
        outcome: Outcome,
    ) {
        if let Some(store) = self.stores.get_mut(&metric) {
            store.set(entity, realization, period, outcome);
        }
    }

    pub fn store(&self, metric: Metric) -> Option<&ResultStore> {
        self.stores.get(&metric)
    }

    pub fn stores(&self) -> impl Iterator<Item = &ResultStore> {
        self.stores.values()
    }

    pub fn stores_mut(&mut self) -> impl Iterator<Item = &mut ResultStore> {
        self.stores.values_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Attempted units apply to every metric table.
    pub fn mark_attempted(&mut self, entity: &str, realization: &str) {
        for store in self.stores.values_mut() {
            store.mark_attempted(entity, realization);
        }
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for store in self.stores.values() {
            let c = store.counts();
            counts.values += c.values;
            counts.degenerate += c.degenerate;
            counts.fit_failed += c.fit_failed;
            counts.missing_baseline += c.missing_baseline;
        }
        counts
    }
}

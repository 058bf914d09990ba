// Persisted result workbooks.
//
// A workbook is a SQLite file holding one table ("sheet") per model
// configuration. Sheets are long-format over the full entity x realization
// x period cross product; cells without a result are stored with a NULL
// value and status `missing`, everything else keeps its outcome status so
// that failed fits stay distinguishable from genuine values.

use crate::error::FlowStatsResult;
use crate::stats::Outcome;
use crate::store::{CellKey, ResultStore};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MISSING_STATUS: &str = "missing";

pub fn workbook_path(dir: &Path, root_name: &str, metric_name: &str) -> PathBuf {
    dir.join(format!("{}_RiverNet_{}.sqlite", root_name, metric_name))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct Workbook {
    conn: Connection,
    path: PathBuf,
}

impl Workbook {
    pub fn open(path: &Path) -> FlowStatsResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sheets (
                name TEXT PRIMARY KEY,
                metric TEXT NOT NULL,
                written_at TEXT NOT NULL
            );",
        )?;
        Ok(Workbook {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> FlowStatsResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM sheets ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn has_sheet(&self, name: &str) -> FlowStatsResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM sheets WHERE name = ?1", [name], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// All stored outcomes of a sheet; `missing` cells are skipped.
    pub fn read_sheet(&self, name: &str) -> FlowStatsResult<Vec<(CellKey, Outcome)>> {
        if !self.has_sheet(name)? {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT network_id, realization, period, value, status FROM {}",
            quote_ident(name)
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut cells = Vec::new();
        for row in rows {
            let (entity, realization, period, value, status) = row?;
            if let Some(outcome) = Outcome::from_status(&status, value) {
                cells.push((
                    CellKey {
                        entity,
                        realization,
                        period,
                    },
                    outcome,
                ));
            }
        }
        Ok(cells)
    }

    /// Replace (or create) one sheet with the contents of `store`. Other
    /// sheets in the workbook are untouched. Returns the rows written.
    pub fn replace_sheet(&mut self, name: &str, store: &ResultStore) -> FlowStatsResult<usize> {
        let table = quote_ident(name);
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                network_id TEXT NOT NULL,
                realization TEXT NOT NULL,
                period TEXT NOT NULL,
                value REAL,
                status TEXT NOT NULL,
                PRIMARY KEY (network_id, realization, period)
             );"
        ))?;

        let mut written = 0;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {table} (network_id, realization, period, value, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;
            let columns: Vec<(&str, &str)> = store.columns().collect();
            for (entity, row) in store.rows() {
                for ((realization, period), outcome) in columns.iter().zip(row) {
                    let (value, status) = match outcome {
                        Some(o) => (o.value(), o.status()),
                        None => (None, MISSING_STATUS),
                    };
                    insert.execute(params![entity, realization, period, value, status])?;
                    written += 1;
                }
            }
        }

        tx.execute(
            "INSERT OR REPLACE INTO sheets (name, metric, written_at) VALUES (?1, ?2, ?3)",
            params![name, store.metric().name(), Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!("Wrote {} rows to sheet '{}' of {:?}", written, name, self.path);
        Ok(written)
    }
}

/// Merge `store` with whatever the workbook already holds for `sheet`, then
/// replace that sheet. The store ends up holding the merged table.
pub fn persist_store(
    dir: &Path,
    root_name: &str,
    sheet: &str,
    store: &mut ResultStore,
) -> FlowStatsResult<PathBuf> {
    let path = workbook_path(dir, root_name, &store.metric().name());
    let mut workbook = Workbook::open(&path)?;

    if workbook.has_sheet(sheet)? {
        let persisted = workbook.read_sheet(sheet)?;
        let restored = store.merge_from_persisted(persisted);
        info!(
            "Merged {} existing cells into {} ({})",
            restored,
            store.metric(),
            sheet
        );
    }

    workbook.replace_sheet(sheet, store)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Metric;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("flowstats_workbook_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sheet_round_trip_preserves_status() {
        let dir = scratch_dir("round_trip");
        let mut store = ResultStore::new(
            Metric::ReturnPeriod(10),
            &strings(&["1.001", "1.002"]),
            &strings(&["01"]),
            &strings(&["WL1.5", "WL2.0"]),
        );
        store.set("1.001", "01", "WL1.5", Outcome::Value(-12.5));
        store.set("1.002", "01", "WL1.5", Outcome::FitFailed);

        let path = workbook_path(&dir, "test", "ReturnPeriod_10yr");
        let mut wb = Workbook::open(&path).unwrap();
        assert_eq!(wb.replace_sheet("SHETRAN-UK \"Auto\"", &store).unwrap(), 4);

        let cells = wb.read_sheet("SHETRAN-UK \"Auto\"").unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells.contains(&(CellKey::new("1.001", "01", "WL1.5"), Outcome::Value(-12.5))));
        assert!(cells.contains(&(CellKey::new("1.002", "01", "WL1.5"), Outcome::FitFailed)));
    }

    #[test]
    fn replacing_one_sheet_leaves_others() {
        let dir = scratch_dir("sheets");
        let path = workbook_path(&dir, "test", "Q50");
        let mut store = ResultStore::new(Metric::Q50, &strings(&["1.001"]), &strings(&["01"]), &strings(&["p"]));
        store.set("1.001", "01", "p", Outcome::Value(1.0));

        let mut wb = Workbook::open(&path).unwrap();
        wb.replace_sheet("HBV", &store).unwrap();
        store.set("1.001", "01", "p", Outcome::Value(2.0));
        wb.replace_sheet("SHETRAN", &store).unwrap();
        wb.replace_sheet("SHETRAN", &store).unwrap();

        assert_eq!(wb.sheet_names().unwrap(), vec!["HBV", "SHETRAN"]);
        assert_eq!(wb.read_sheet("HBV").unwrap()[0].1, Outcome::Value(1.0));
        assert_eq!(wb.read_sheet("SHETRAN").unwrap()[0].1, Outcome::Value(2.0));
        assert!(wb.read_sheet("absent").unwrap().is_empty());
    }

    #[test]
    fn persist_merges_with_existing_sheet() {
        let dir = scratch_dir("persist");
        let entities = strings(&["1.001", "2.001"]);
        let reals = strings(&["01"]);
        let periods = strings(&["p"]);

        let mut first = ResultStore::new(Metric::Q01, &entities, &reals, &periods);
        first.set("1.001", "01", "p", Outcome::Value(1.0));
        first.set("2.001", "01", "p", Outcome::Value(2.0));
        persist_store(&dir, "run", "SHETRAN", &mut first).unwrap();

        // A resumed run that only recomputed catchment 2.
        let mut second = ResultStore::new(Metric::Q01, &entities, &reals, &periods);
        second.set("2.001", "01", "p", Outcome::Value(20.0));
        let path = persist_store(&dir, "run", "SHETRAN", &mut second).unwrap();

        assert_eq!(second.get("1.001", "01", "p"), Some(Outcome::Value(1.0)));
        assert_eq!(second.get("2.001", "01", "p"), Some(Outcome::Value(20.0)));
        let wb = Workbook::open(&path).unwrap();
        assert_eq!(wb.read_sheet("SHETRAN").unwrap().len(), 2);
    }
}

use super::{Grid, RangeWrite, SheetStore, ValueInputMode};
use crate::address::RangeSpec;
use crate::errors::StoreError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StoreOp {
    List,
    Create,
    Read,
    Write,
    BatchWrite,
}

/// One call as the store saw it. `target` is the sheet title or rendered range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub target: String,
    pub mode: Option<ValueInputMode>,
}

#[derive(Debug, Clone)]
struct FailureRule {
    op: StoreOp,
    target_prefix: Option<String>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    sheets: Vec<SeedSheet>,
}

#[derive(Debug, Deserialize)]
struct SeedSheet {
    title: String,
    #[serde(default)]
    rows: Grid,
}

/// Spreadsheet held in process. Sheets keep insertion order, reads trim trailing blanks
/// like the remote API does, and failures or latency can be injected per operation.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sheets: RwLock<Vec<(String, Grid)>>,
    failures: Mutex<Vec<FailureRule>>,
    calls: Mutex<Vec<StoreCall>>,
    delay: Mutex<Option<Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load sheets from a JSON file shaped `{"sheets": [{"title": .., "rows": [[..]]}]}`.
    pub fn from_seed_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {:?}", path))?;
        let seed: SeedFile = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse seed file {:?}", path))?;
        let store = Self::new();
        for sheet in seed.sheets {
            store.insert_sheet(&sheet.title, sheet.rows);
        }
        Ok(store)
    }

    pub fn with_sheet(self, title: &str, rows: Grid) -> Self {
        self.insert_sheet(title, rows);
        self
    }

    pub fn insert_sheet(&self, title: &str, rows: Grid) {
        let mut sheets = self.sheets.write();
        match sheets.iter_mut().find(|(name, _)| name == title) {
            Some((_, grid)) => *grid = rows,
            None => sheets.push((title.to_string(), rows)),
        }
    }

    /// Fail every `op` whose target starts with `target_prefix` (or every `op` when `None`).
    pub fn fail_on(&self, op: StoreOp, target_prefix: Option<&str>, message: &str) {
        self.failures.lock().push(FailureRule {
            op,
            target_prefix: target_prefix.map(str::to_string),
            message: message.to_string(),
        });
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, op: StoreOp) -> usize {
        self.calls.lock().iter().filter(|call| call.op == op).count()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.read().iter().map(|(name, _)| name.clone()).collect()
    }

    /// Full grid of a sheet, exactly as written.
    pub fn sheet(&self, title: &str) -> Option<Grid> {
        self.sheets
            .read()
            .iter()
            .find(|(name, _)| name == title)
            .map(|(_, grid)| grid.clone())
    }

    async fn enter(&self, op: StoreOp, target: &str, mode: Option<ValueInputMode>) -> Result<(), StoreError> {
        self.calls.lock().push(StoreCall {
            op,
            target: target.to_string(),
            mode,
        });

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failures = self.failures.lock();
        let hit = failures.iter().find(|rule| {
            rule.op == op
                && rule
                    .target_prefix
                    .as_deref()
                    .is_none_or(|prefix| target.starts_with(prefix))
        });
        match hit {
            Some(rule) => Err(StoreError::rejected(rule.message.clone())),
            None => Ok(()),
        }
    }

    fn apply_write(&self, write: &RangeWrite) -> Result<(), StoreError> {
        let mut sheets = self.sheets.write();
        let (_, grid) = sheets
            .iter_mut()
            .find(|(name, _)| *name == write.range.sheet)
            .ok_or_else(|| StoreError::rejected(format!("sheet '{}' not found", write.range.sheet)))?;

        let row0 = write.range.start.row as usize - 1;
        let col0 = write.range.start.col as usize - 1;
        for (r, values) in write.values.iter().enumerate() {
            let target_row = row0 + r;
            if grid.len() <= target_row {
                grid.resize(target_row + 1, Vec::new());
            }
            let row = &mut grid[target_row];
            for (c, value) in values.iter().enumerate() {
                let target_col = col0 + c;
                if row.len() <= target_col {
                    row.resize(target_col + 1, String::new());
                }
                row[target_col] = value.clone();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SheetStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_sheet_names(&self, spreadsheet_id: &str) -> Result<Vec<String>, StoreError> {
        self.enter(StoreOp::List, spreadsheet_id, None).await?;
        Ok(self.sheet_names())
    }

    async fn create_sheet(&self, _spreadsheet_id: &str, title: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Create, title, None).await?;
        let mut sheets = self.sheets.write();
        if sheets.iter().any(|(name, _)| name == title) {
            return Err(StoreError::rejected(format!(
                "a sheet with the name \"{title}\" already exists"
            )));
        }
        sheets.push((title.to_string(), Grid::new()));
        Ok(())
    }

    async fn read_range(&self, _spreadsheet_id: &str, range: &RangeSpec) -> Result<Grid, StoreError> {
        self.enter(StoreOp::Read, &range.to_string(), None).await?;
        let grid = self
            .sheet(&range.sheet)
            .ok_or_else(|| StoreError::rejected(format!("unable to parse range: {range}")))?;

        let first_row = range.start.row as usize - 1;
        let first_col = range.start.col as usize - 1;
        let (last_col, last_row) = match range.end {
            Some(end) => (end.col as usize, end.row.map(|r| r as usize)),
            None => (range.start.col as usize, Some(range.start.row as usize)),
        };
        let last_row = last_row.unwrap_or(grid.len()).min(grid.len());

        let mut out: Grid = (first_row..last_row)
            .map(|r| {
                let row = &grid[r];
                let mut cells: Vec<String> = (first_col..last_col)
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect();
                while cells.last().is_some_and(String::is_empty) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while out.last().is_some_and(Vec::is_empty) {
            out.pop();
        }
        Ok(out)
    }

    async fn write_range(
        &self,
        _spreadsheet_id: &str,
        write: &RangeWrite,
        mode: ValueInputMode,
    ) -> Result<(), StoreError> {
        self.enter(StoreOp::Write, &write.range.to_string(), Some(mode))
            .await?;
        self.apply_write(write)
    }

    async fn batch_write(
        &self,
        _spreadsheet_id: &str,
        writes: &[RangeWrite],
        mode: ValueInputMode,
    ) -> Result<(), StoreError> {
        let target = writes
            .iter()
            .map(|write| write.range.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.enter(StoreOp::BatchWrite, &target, Some(mode)).await?;

        let snapshot = self.sheets.read().clone();
        for write in writes {
            if let Err(err) = self.apply_write(write) {
                *self.sheets.write() = snapshot;
                return Err(err);
            }
        }
        Ok(())
    }
}

//! Daily rollover: select, read, build, create, write.
//!
//! Every step is a separate call against the sheet store and nothing is rolled back.
//! A failure after the create leaves today's sheet behind; `WriteFailed` lists what
//! had already been written so it can be cleaned up by hand.

use crate::address::RangeSpec;
use crate::builder::{FIRST_BODY_ROW, Snapshot, build_snapshot};
use crate::config::ServerConfig;
use crate::errors::{MappingError, SnapshotError, StoreError};
use crate::flight::SingleFlight;
use crate::mapping::ColumnMapping;
use crate::selector::{
    DatePattern, DatedSheet, SelectError, YearMonth, ensure_sheet_absent, select_reference_sheet,
};
use crate::store::{Grid, RangeWrite, SheetStore, ValueInputMode};
use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

const SHEET_LIST_TARGET: &str = "sheets";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Header, body and each formula column as separate writes.
    #[default]
    Sequential,
    /// All ranges in one batch call.
    Batched,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Sequential => write!(f, "sequential"),
            WriteMode::Batched => write!(f, "batched"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub spreadsheet_id: String,
    pub mapping: ColumnMapping,
    pub date_pattern: DatePattern,
    pub write_mode: WriteMode,
    pub request_timeout: Option<Duration>,
}

impl SnapshotOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id.clone(),
            mapping: config.mapping.clone(),
            date_pattern: config.date_pattern,
            write_mode: config.write_mode,
            request_timeout: config.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub run_id: Uuid,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub reference: String,
    pub rows_written: usize,
    pub formula_columns: Vec<String>,
    pub ranges_written: Vec<String>,
    pub write_mode: WriteMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Reference sheet choice plus the titles it was chosen from.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub sheet_names: Vec<String>,
    pub reference: DatedSheet,
    pub sheet_name: String,
    /// The reference is dated after `today`, usually a mistyped title.
    pub reference_ahead: bool,
}

pub struct SnapshotService {
    store: Arc<dyn SheetStore>,
    options: SnapshotOptions,
    flights: SingleFlight,
}

impl SnapshotService {
    pub fn new(store: Arc<dyn SheetStore>, options: SnapshotOptions) -> Result<Self, MappingError> {
        options.mapping.validate()?;
        Ok(Self {
            store,
            options,
            flights: SingleFlight::new(),
        })
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub fn is_running(&self) -> bool {
        self.flights.is_active(&self.options.spreadsheet_id)
    }

    pub async fn list_sheet_names(&self) -> Result<Vec<String>, SnapshotError> {
        self.call(self.store.list_sheet_names(&self.options.spreadsheet_id))
            .await
            .map_err(|source| SnapshotError::ReadFailed {
                range: SHEET_LIST_TARGET.to_string(),
                source,
            })
    }

    /// Steps 1 and 2: pick the reference sheet and refuse a second sheet for `today`.
    pub async fn select(&self, today: NaiveDate) -> Result<Selection, SnapshotError> {
        let sheet_names = self.list_sheet_names().await?;
        let pattern = self.options.date_pattern;

        let reference = select_reference_sheet(&sheet_names, pattern).map_err(|err| {
            tracing::warn!(
                spreadsheet_id = %self.options.spreadsheet_id,
                %pattern,
                sheet_count = sheet_names.len(),
                "no dated reference sheet"
            );
            select_error(err)
        })?;
        let sheet_name = ensure_sheet_absent(&sheet_names, today, pattern).map_err(select_error)?;
        let reference_ahead = reference.date > today;
        if reference_ahead {
            tracing::warn!(
                spreadsheet_id = %self.options.spreadsheet_id,
                reference = %reference.name,
                %today,
                "reference sheet is dated after today"
            );
        }

        tracing::info!(
            spreadsheet_id = %self.options.spreadsheet_id,
            reference = %reference.name,
            sheet = %sheet_name,
            "reference sheet selected"
        );
        Ok(Selection {
            sheet_names,
            reference,
            sheet_name,
            reference_ahead,
        })
    }

    /// Everything except the create and the writes.
    pub async fn preview(&self, today: NaiveDate) -> Result<Snapshot, SnapshotError> {
        let selection = self.select(today).await?;
        let (header, body) = self.read_reference(&selection.reference).await?;
        Ok(build_snapshot(
            &self.options.mapping,
            &header,
            &body,
            &selection.reference,
            &selection.sheet_name,
            YearMonth::from(today),
        )?)
    }

    pub async fn run_daily_snapshot(&self, today: NaiveDate) -> Result<SnapshotReport, SnapshotError> {
        let spreadsheet_id = self.options.spreadsheet_id.clone();
        let _permit = self.flights.try_acquire(&spreadsheet_id).ok_or_else(|| {
            tracing::warn!(spreadsheet_id = %spreadsheet_id, "snapshot already in flight");
            SnapshotError::Busy {
                spreadsheet_id: spreadsheet_id.clone(),
            }
        })?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("snapshot", %run_id, spreadsheet_id = %spreadsheet_id);
        self.run_steps(run_id, today).instrument(span).await
    }

    async fn run_steps(&self, run_id: Uuid, today: NaiveDate) -> Result<SnapshotReport, SnapshotError> {
        let spreadsheet_id = self.options.spreadsheet_id.clone();
        let started_at = Utc::now();

        let selection = self.select(today).await?;
        let sheet_name = selection.sheet_name.clone();

        self.call(self.store.create_sheet(&spreadsheet_id, &sheet_name))
            .await
            .map_err(|source| {
                tracing::error!(sheet = %sheet_name, error = %source, "create failed");
                SnapshotError::CreateFailed {
                    sheet: sheet_name.clone(),
                    source,
                }
            })?;
        tracing::info!(sheet = %sheet_name, "sheet created");

        let (header, body) = self.read_reference(&selection.reference).await.inspect_err(|err| {
            tracing::error!(
                sheet = %sheet_name,
                error = %err,
                "read failed; created sheet left empty"
            );
        })?;

        let snapshot = build_snapshot(
            &self.options.mapping,
            &header,
            &body,
            &selection.reference,
            &sheet_name,
            YearMonth::from(today),
        )?;

        let writes = plan_writes(&snapshot);
        let ranges_written = match self.options.write_mode {
            WriteMode::Sequential => self.write_sequential(&writes).await?,
            WriteMode::Batched => self.write_batched(&writes).await?,
        };

        let report = SnapshotReport {
            run_id,
            spreadsheet_id,
            sheet_name,
            reference: selection.reference.name,
            rows_written: snapshot.body.len(),
            formula_columns: snapshot
                .formula_columns
                .iter()
                .map(|column| column.letter.clone())
                .collect(),
            ranges_written,
            write_mode: self.options.write_mode,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            sheet = %report.sheet_name,
            reference = %report.reference,
            rows = report.rows_written,
            "snapshot complete"
        );
        Ok(report)
    }

    async fn read_reference(&self, reference: &DatedSheet) -> Result<(Grid, Grid), SnapshotError> {
        let width = self.options.mapping.source_width() as u32;
        let header_range = RangeSpec::row_span(&reference.name, 1, 1, width);
        let body_range = RangeSpec::open_ended(&reference.name, FIRST_BODY_ROW, 1, width);

        let header = self.read(&header_range).await?;
        let body = self.read(&body_range).await?;
        tracing::debug!(
            reference = %reference.name,
            header_cells = header.first().map(Vec::len).unwrap_or(0),
            body_rows = body.len(),
            "reference sheet read"
        );
        Ok((header, body))
    }

    async fn read(&self, range: &RangeSpec) -> Result<Grid, SnapshotError> {
        self.call(self.store.read_range(&self.options.spreadsheet_id, range))
            .await
            .map_err(|source| SnapshotError::ReadFailed {
                range: range.to_string(),
                source,
            })
    }

    async fn write_sequential(&self, writes: &[RangeWrite]) -> Result<Vec<String>, SnapshotError> {
        let mut written = Vec::with_capacity(writes.len());
        for write in writes {
            let range = write.range.to_string();
            let result = self
                .call(self.store.write_range(
                    &self.options.spreadsheet_id,
                    write,
                    ValueInputMode::UserEntered,
                ))
                .await;
            if let Err(source) = result {
                tracing::error!(
                    range = %range,
                    written = ?written,
                    error = %source,
                    "write failed; sheet partially populated"
                );
                return Err(SnapshotError::WriteFailed {
                    range,
                    written,
                    source,
                });
            }
            tracing::info!(range = %range, rows = write.values.len(), "range written");
            written.push(range);
        }
        Ok(written)
    }

    async fn write_batched(&self, writes: &[RangeWrite]) -> Result<Vec<String>, SnapshotError> {
        let ranges: Vec<String> = writes.iter().map(|write| write.range.to_string()).collect();
        if writes.is_empty() {
            return Ok(ranges);
        }
        self.call(self.store.batch_write(
            &self.options.spreadsheet_id,
            writes,
            ValueInputMode::UserEntered,
        ))
        .await
        .map_err(|source| {
            tracing::error!(ranges = ?ranges, error = %source, "batched write failed");
            SnapshotError::WriteFailed {
                range: ranges.join(", "),
                written: Vec::new(),
                source,
            }
        })?;
        tracing::info!(ranges = ?ranges, "ranges written in one batch");
        Ok(ranges)
    }

    async fn call<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match self.options.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    after_ms: limit.as_millis() as u64,
                }),
            },
            None => fut.await,
        }
    }
}

/// Header at A1, body at A2, then one single-column write per formula column.
/// Empty parts are skipped.
pub fn plan_writes(snapshot: &Snapshot) -> Vec<RangeWrite> {
    let mut writes = Vec::new();
    if let Some(header) = &snapshot.header {
        writes.push(RangeWrite::new(
            RangeSpec::anchor(&snapshot.sheet_name, 1, 1),
            vec![header.clone()],
        ));
    }
    if snapshot.body.is_empty() {
        return writes;
    }
    writes.push(RangeWrite::new(
        RangeSpec::anchor(&snapshot.sheet_name, 1, snapshot.first_row),
        snapshot.body.clone(),
    ));
    for column in &snapshot.formula_columns {
        writes.push(RangeWrite::new(
            RangeSpec::anchor(&snapshot.sheet_name, column.col, snapshot.first_row),
            column.cells.iter().map(|cell| vec![cell.clone()]).collect(),
        ));
    }
    writes
}

fn select_error(err: SelectError) -> SnapshotError {
    match err {
        SelectError::NotFound { .. } => SnapshotError::NoReferenceSheet,
        SelectError::AlreadyExists { name } => SnapshotError::DuplicateSheet { name },
    }
}

impl fmt::Display for SnapshotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created from {} ({} rows, formulas in {})",
            self.sheet_name,
            self.reference,
            self.rows_written,
            if self.formula_columns.is_empty() {
                "no columns".to_string()
            } else {
                self.formula_columns.join(", ")
            }
        )
    }
}

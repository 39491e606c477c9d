use crate::address::{col_from_letters, column_letters};
use crate::errors::MappingError;
use crate::formula::FormulaContext;
use crate::mapping::{CellSource, ColumnMapping};
use crate::selector::{DatedSheet, YearMonth};
use serde::Serialize;

/// Spreadsheet row of the first body row; the header sits on row 1.
pub const FIRST_BODY_ROW: u32 = 2;

pub type Row = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormulaColumn {
    /// 1-based target column.
    pub col: u32,
    pub letter: String,
    /// One formula per body row, in row order starting at [`FIRST_BODY_ROW`].
    pub cells: Vec<String>,
}

/// Everything the new sheet receives, computed before any write is issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub sheet_name: String,
    pub reference: String,
    pub header: Option<Row>,
    pub body: Vec<Row>,
    pub formula_columns: Vec<FormulaColumn>,
    pub first_row: u32,
}

impl Snapshot {
    pub fn last_row(&self) -> Option<u32> {
        if self.body.is_empty() {
            None
        } else {
            Some(self.first_row + self.body.len() as u32 - 1)
        }
    }
}

/// Build the new sheet's content from the reference sheet's header and body ranges.
///
/// Every source row yields exactly one output row of `mapping.width()` cells, so the row
/// number stamped into formulas matches the row the body write lands on.
pub fn build_snapshot(
    mapping: &ColumnMapping,
    header_rows: &[Row],
    body_rows: &[Row],
    reference: &DatedSheet,
    today_name: &str,
    current_month: YearMonth,
) -> Result<Snapshot, MappingError> {
    let header = header_rows
        .first()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .cloned();

    let same_month = reference.month() == current_month;
    let formula_specs: Vec<_> = mapping.formula_columns().collect();
    let mut formula_columns: Vec<FormulaColumn> = formula_specs
        .iter()
        .map(|(col, _)| FormulaColumn {
            col: *col,
            letter: column_letters(*col),
            cells: Vec::with_capacity(body_rows.len()),
        })
        .collect();

    let mut body = Vec::with_capacity(body_rows.len());
    let mut row_number = FIRST_BODY_ROW;
    for source in body_rows {
        let row = literal_row(mapping, source, today_name);

        let ctx = FormulaContext {
            row: row_number,
            reference: &reference.name,
            today: today_name,
            same_month,
            values: &row,
        };
        for ((col, template), column) in formula_specs.iter().zip(formula_columns.iter_mut()) {
            let cell = template
                .render(&ctx)
                .map_err(|err| MappingError::InvalidTemplate {
                    target: column_letters(*col),
                    message: err.to_string(),
                })?;
            column.cells.push(cell);
        }

        body.push(row);
        row_number += 1;
    }

    Ok(Snapshot {
        sheet_name: today_name.to_string(),
        reference: reference.name.clone(),
        header,
        body,
        formula_columns,
        first_row: FIRST_BODY_ROW,
    })
}

fn literal_row(mapping: &ColumnMapping, source: &[String], today_name: &str) -> Row {
    mapping
        .columns()
        .iter()
        .map(|spec| match &spec.source {
            CellSource::Copy { column, default } => col_from_letters(column)
                .and_then(|col| source.get(col as usize - 1))
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| default.clone()),
            CellSource::Reset { value } => value.clone(),
            CellSource::Today => today_name.to_string(),
            CellSource::Formula(_) => String::new(),
        })
        .collect()
}

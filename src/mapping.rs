//! Column layouts for the new sheet, expressed as data.

use crate::address::{col_from_letters, column_letters};
use crate::errors::MappingError;
use crate::formula::FormulaTemplate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where one target column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellSource {
    /// Copy the reference sheet's cell in `column` (A1 letters), falling back to
    /// `default` when that cell is blank or the source row is too short to have it.
    Copy {
        column: String,
        #[serde(default)]
        default: String,
    },
    /// Restart the column every period.
    Reset {
        #[serde(default)]
        value: String,
    },
    /// The new sheet's title.
    Today,
    /// Left blank in the body and written as a separate formula column.
    Formula(FormulaTemplate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub source: CellSource,
}

impl ColumnSpec {
    fn new(header: &str, source: CellSource) -> Self {
        Self {
            header: Some(header.to_string()),
            source,
        }
    }

    fn copy(header: &str, column: &str, default: &str) -> Self {
        Self::new(
            header,
            CellSource::Copy {
                column: column.to_string(),
                default: default.to_string(),
            },
        )
    }

    fn reset(header: &str, value: &str) -> Self {
        Self::new(
            header,
            CellSource::Reset {
                value: value.to_string(),
            },
        )
    }

    fn formula(header: &str, template: FormulaTemplate) -> Self {
        Self::new(header, CellSource::Formula(template))
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.source, CellSource::Formula(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Inventory,
    Ledger,
    Custom,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Inventory => write!(f, "inventory"),
            Layout::Ledger => write!(f, "ledger"),
            Layout::Custom => write!(f, "custom"),
        }
    }
}

/// Target columns in order, starting at column A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnMapping {
    columns: Vec<ColumnSpec>,
}

impl ColumnMapping {
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, MappingError> {
        let mapping = Self { columns };
        mapping.validate()?;
        Ok(mapping)
    }

    pub fn for_layout(layout: Layout, columns: Option<Vec<ColumnSpec>>) -> Result<Self, MappingError> {
        match (layout, columns) {
            (Layout::Custom, Some(columns)) => Self::new(columns),
            (Layout::Custom, None) => Err(MappingError::MissingColumns),
            (Layout::Inventory, _) => Ok(Self::inventory()),
            (Layout::Ledger, _) => Ok(Self::ledger()),
        }
    }

    /// Date, Product, UnitValue, ProfitPercent, TotalValue, UnitsSold, UnitsRemaining,
    /// InitialInventory. Units sold restart each day; the totals are recomputed.
    pub fn inventory() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new("Date", CellSource::Today),
                ColumnSpec::copy("Product", "B", ""),
                ColumnSpec::copy("UnitValue", "C", ""),
                ColumnSpec::copy("ProfitPercent", "D", ""),
                ColumnSpec::formula(
                    "TotalValue",
                    FormulaTemplate::flat("=C{row}*(1+D{row}/100)*F{row}"),
                ),
                ColumnSpec::reset("UnitsSold", ""),
                ColumnSpec::formula("UnitsRemaining", FormulaTemplate::flat("=H{row}-F{row}")),
                ColumnSpec::copy("InitialInventory", "H", ""),
            ],
        }
    }

    /// Date, Client, Loan, Interest, Payment, Balance, RunningTotal. The running total
    /// carries over from the reference sheet within a month and restarts on a new one.
    pub fn ledger() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new("Date", CellSource::Today),
                ColumnSpec::copy("Client", "B", ""),
                ColumnSpec::copy("Loan", "C", "0"),
                ColumnSpec::copy("Interest", "D", "0"),
                ColumnSpec::reset("Payment", "0"),
                ColumnSpec::formula("Balance", FormulaTemplate::flat("=C{row}+D{row}-E{row}")),
                ColumnSpec::formula(
                    "RunningTotal",
                    FormulaTemplate::monthly("={ref}!G{row}+{value:C}", "{value:C}"),
                ),
            ],
        }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of reference-sheet columns to read: wide enough for every copied column and
    /// for the header of every target column.
    pub fn source_width(&self) -> usize {
        self.columns
            .iter()
            .filter_map(|spec| match &spec.source {
                CellSource::Copy { column, .. } => col_from_letters(column).map(|c| c as usize),
                _ => None,
            })
            .chain(std::iter::once(self.width()))
            .max()
            .unwrap_or(0)
    }

    /// Formula columns as (1-based column, template).
    pub fn formula_columns(&self) -> impl Iterator<Item = (u32, &FormulaTemplate)> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(idx, spec)| match &spec.source {
                CellSource::Formula(template) => Some((idx as u32 + 1, template)),
                _ => None,
            })
    }

    pub fn validate(&self) -> Result<(), MappingError> {
        if self.columns.is_empty() {
            return Err(MappingError::Empty);
        }

        let literal_columns: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, spec)| !spec.is_formula())
            .map(|(idx, _)| idx)
            .collect();

        for (idx, spec) in self.columns.iter().enumerate() {
            let target = column_letters(idx as u32 + 1);
            match &spec.source {
                CellSource::Copy { column, .. } => {
                    if col_from_letters(column).is_none() {
                        return Err(MappingError::InvalidSourceColumn {
                            target,
                            column: column.clone(),
                        });
                    }
                }
                CellSource::Formula(template) => {
                    template
                        .validate(self.width(), &literal_columns)
                        .map_err(|err| MappingError::InvalidTemplate {
                            target,
                            message: err.to_string(),
                        })?;
                }
                CellSource::Reset { .. } | CellSource::Today => {}
            }
        }
        Ok(())
    }
}

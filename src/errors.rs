use serde::Serialize;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Failure reported by a [`crate::store::SheetStore`] call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("spreadsheet API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("spreadsheet API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected spreadsheet API response: {0}")]
    Decode(String),
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("{0}")]
    Rejected(String),
}

impl StoreError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    NoReferenceSheet,
    DuplicateSheet,
    Busy,
    InvalidMapping,
    CreateFailed,
    ReadFailed,
    WriteFailed,
}

/// Why a snapshot run stopped. Nothing is retried; the variants that follow a successful
/// create leave the new sheet behind, possibly half written.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no dated sheet found to use as reference")]
    NoReferenceSheet,
    #[error("sheet '{name}' already exists")]
    DuplicateSheet { name: String },
    #[error("a snapshot for spreadsheet '{spreadsheet_id}' is already running")]
    Busy { spreadsheet_id: String },
    #[error(transparent)]
    InvalidMapping(#[from] MappingError),
    #[error("failed to create sheet '{sheet}': {source}")]
    CreateFailed { sheet: String, source: StoreError },
    #[error("failed to read '{range}': {source}")]
    ReadFailed { range: String, source: StoreError },
    #[error("failed to write '{range}' ({} range(s) already written): {source}", .written.len())]
    WriteFailed {
        range: String,
        written: Vec<String>,
        source: StoreError,
    },
}

impl SnapshotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoReferenceSheet => ErrorCategory::NoReferenceSheet,
            Self::DuplicateSheet { .. } => ErrorCategory::DuplicateSheet,
            Self::Busy { .. } => ErrorCategory::Busy,
            Self::InvalidMapping(_) => ErrorCategory::InvalidMapping,
            Self::CreateFailed { .. } => ErrorCategory::CreateFailed,
            Self::ReadFailed { .. } => ErrorCategory::ReadFailed,
            Self::WriteFailed { .. } => ErrorCategory::WriteFailed,
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::CreateFailed { source, .. }
            | Self::ReadFailed { source, .. }
            | Self::WriteFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.store_error().is_some_and(StoreError::is_timeout)
    }

    /// Ranges committed before the failing write.
    pub fn written_ranges(&self) -> &[String] {
        match self {
            Self::WriteFailed { written, .. } => written,
            _ => &[],
        }
    }
}

/// A column layout that cannot be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("column layout must declare at least one column")]
    Empty,
    #[error("column {target}: invalid source column '{column}'")]
    InvalidSourceColumn { target: String, column: String },
    #[error("column {target}: {message}")]
    InvalidTemplate { target: String, message: String },
    #[error("custom layout requires a `columns` list in the config file")]
    MissingColumns,
}

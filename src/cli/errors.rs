use crate::errors::{ErrorCategory, SnapshotError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub written: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub try_this: Option<String>,
}

pub fn envelope_for(error: &anyhow::Error) -> ErrorEnvelope {
    if let Some(snapshot_error) = error.downcast_ref::<SnapshotError>() {
        return snapshot_envelope(snapshot_error);
    }

    let message = format!("{error:#}");

    if message.contains("spreadsheet id is required") {
        return ErrorEnvelope {
            code: "MISSING_SPREADSHEET_ID".to_string(),
            message,
            written: Vec::new(),
            try_this: Some(
                "pass `--spreadsheet-id <ID>` or set SHEET_ROLLOVER_SPREADSHEET_ID".to_string(),
            ),
        };
    }

    if message.contains("access token is required") {
        return ErrorEnvelope {
            code: "MISSING_CREDENTIALS".to_string(),
            message,
            written: Vec::new(),
            try_this: Some(
                "set SHEET_ROLLOVER_ACCESS_TOKEN, or use `--store memory --seed <FILE>` offline"
                    .to_string(),
            ),
        };
    }

    if message.contains("config") || message.contains("column layout") {
        return ErrorEnvelope {
            code: "INVALID_CONFIG".to_string(),
            message,
            written: Vec::new(),
            try_this: Some("check the file passed to `--config`".to_string()),
        };
    }

    if message.contains("seed file") {
        return ErrorEnvelope {
            code: "INVALID_SEED".to_string(),
            message,
            written: Vec::new(),
            try_this: Some(
                "seed files look like {\"sheets\": [{\"title\": \"2024-01-06\", \"rows\": [[..]]}]}"
                    .to_string(),
            ),
        };
    }

    ErrorEnvelope {
        code: "COMMAND_FAILED".to_string(),
        message,
        written: Vec::new(),
        try_this: None,
    }
}

fn snapshot_envelope(error: &SnapshotError) -> ErrorEnvelope {
    let category = error.category();
    let try_this = match category {
        ErrorCategory::NoReferenceSheet => {
            Some("run `list-sheets` to see which titles parse as dates".to_string())
        }
        ErrorCategory::DuplicateSheet => {
            Some("today's sheet is already there; delete it first to rebuild".to_string())
        }
        ErrorCategory::Busy => Some("wait for the running snapshot to finish".to_string()),
        ErrorCategory::WriteFailed => Some(
            "the new sheet is partially written; delete it before re-running".to_string(),
        ),
        ErrorCategory::CreateFailed | ErrorCategory::ReadFailed if error.is_timeout() => {
            Some("raise `--request-timeout-ms` or retry later".to_string())
        }
        _ => None,
    };
    ErrorEnvelope {
        code: category.as_ref().to_ascii_uppercase(),
        message: error.to_string(),
        written: error.written_ranges().to_vec(),
        try_this,
    }
}

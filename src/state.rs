use crate::config::ServerConfig;
use crate::errors::{ErrorCategory, SnapshotError};
use crate::snapshot::{SnapshotOptions, SnapshotReport, SnapshotService};
use crate::store::{SheetStore, build_store};
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of the most recent trigger, as the status endpoint reports it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunRecord {
    Created {
        report: SnapshotReport,
    },
    Failed {
        at: DateTime<Utc>,
        category: ErrorCategory,
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        written: Vec<String>,
    },
}

impl RunRecord {
    fn failed(err: &SnapshotError) -> Self {
        Self::Failed {
            at: Utc::now(),
            category: err.category(),
            message: err.to_string(),
            written: err.written_ranges().to_vec(),
        }
    }
}

pub struct AppState {
    config: Arc<ServerConfig>,
    service: SnapshotService,
    last_run: RwLock<Option<RunRecord>>,
    fixed_date: Option<NaiveDate>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let store = build_store(&config)?;
        Self::new_with_store(config, store)
    }

    pub fn new_with_store(config: Arc<ServerConfig>, store: Arc<dyn SheetStore>) -> Result<Self> {
        let service = SnapshotService::new(store, SnapshotOptions::from_config(&config))?;
        Ok(Self {
            config,
            service,
            last_run: RwLock::new(None),
            fixed_date: None,
        })
    }

    /// Pin "today" instead of reading the local clock.
    pub fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn service(&self) -> &SnapshotService {
        &self.service
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Run today's snapshot and remember how it went.
    pub async fn trigger(&self) -> Result<SnapshotReport, SnapshotError> {
        let today = self.today();
        let result = self.service.run_daily_snapshot(today).await;
        // Busy leaves the record of the run holding the guard in place.
        match &result {
            Ok(report) => {
                *self.last_run.write() = Some(RunRecord::Created {
                    report: report.clone(),
                });
            }
            Err(SnapshotError::Busy { .. }) => {}
            Err(err) => *self.last_run.write() = Some(RunRecord::failed(err)),
        }
        result
    }

    pub fn last_run(&self) -> Option<RunRecord> {
        self.last_run.read().clone()
    }
}

use crate::address::RangeSpec;
use crate::config::{ServerConfig, StoreKind};
use crate::errors::StoreError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod google;
pub mod memory;

pub use google::GoogleSheetsStore;
pub use memory::{InMemoryStore, StoreCall, StoreOp};

pub type Grid = Vec<Vec<String>>;

/// How the store treats written strings. Formulas only take effect as `UserEntered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputMode {
    Raw,
    UserEntered,
}

impl ValueInputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::UserEntered => "USER_ENTERED",
        }
    }
}

impl fmt::Display for ValueInputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeWrite {
    pub range: RangeSpec,
    pub values: Grid,
}

impl RangeWrite {
    pub fn new(range: RangeSpec, values: Grid) -> Self {
        Self { range, values }
    }
}

/// The remote spreadsheet, reduced to the calls a rollover needs. Each call is atomic on
/// its own; nothing spans calls.
#[async_trait]
pub trait SheetStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_sheet_names(&self, spreadsheet_id: &str) -> Result<Vec<String>, StoreError>;

    async fn create_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<(), StoreError>;

    /// Rows may be ragged; trailing empty cells and rows are not returned.
    async fn read_range(&self, spreadsheet_id: &str, range: &RangeSpec) -> Result<Grid, StoreError>;

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        write: &RangeWrite,
        mode: ValueInputMode,
    ) -> Result<(), StoreError>;

    async fn batch_write(
        &self,
        spreadsheet_id: &str,
        writes: &[RangeWrite],
        mode: ValueInputMode,
    ) -> Result<(), StoreError> {
        for write in writes {
            self.write_range(spreadsheet_id, write, mode).await?;
        }
        Ok(())
    }
}

/// Build the store the configuration asks for.
pub fn build_store(config: &ServerConfig) -> Result<Arc<dyn SheetStore>> {
    match config.store {
        StoreKind::Google => {
            let token = config
                .access_token
                .as_ref()
                .context("an access token is required for the google store (set SHEET_ROLLOVER_ACCESS_TOKEN)")?;
            let store = GoogleSheetsStore::new(
                &config.api_base_url,
                token.expose(),
                config.request_timeout(),
            )?;
            Ok(Arc::new(store))
        }
        StoreKind::Memory => {
            let store = match config.memory_seed.as_ref() {
                Some(path) => InMemoryStore::from_seed_file(path)?,
                None => InMemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}

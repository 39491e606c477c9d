use crate::mapping::{ColumnMapping, ColumnSpec, Layout};
use crate::selector::DatePattern;
use crate::snapshot::WriteMode;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_STATUS_PATH: &str = "/status";
const DEFAULT_TRIGGER_PATH: &str = "/create_today";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Google,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Bearer token kept out of `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub spreadsheet_id: String,
    pub store: StoreKind,
    pub access_token: Option<SecretString>,
    pub api_base_url: String,
    /// JSON seed for the memory store.
    pub memory_seed: Option<PathBuf>,
    pub http_bind_address: SocketAddr,
    pub layout: Layout,
    pub mapping: ColumnMapping,
    pub date_pattern: DatePattern,
    pub write_mode: WriteMode,
    pub request_timeout_ms: Option<u64>,
    pub status_path: String,
    pub trigger_path: String,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            spreadsheet_id: cli_spreadsheet_id,
            store: cli_store,
            access_token: cli_access_token,
            api_base_url: cli_api_base_url,
            memory_seed: cli_memory_seed,
            http_bind: cli_http_bind,
            layout: cli_layout,
            date_pattern: cli_date_pattern,
            write_mode: cli_write_mode,
            request_timeout_ms: cli_request_timeout_ms,
            status_path: cli_status_path,
            trigger_path: cli_trigger_path,
            log_format: cli_log_format,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            spreadsheet_id: file_spreadsheet_id,
            store: file_store,
            access_token: file_access_token,
            api_base_url: file_api_base_url,
            memory_seed: file_memory_seed,
            http_bind: file_http_bind,
            layout: file_layout,
            columns: file_columns,
            date_pattern: file_date_pattern,
            write_mode: file_write_mode,
            request_timeout_ms: file_request_timeout_ms,
            status_path: file_status_path,
            trigger_path: file_trigger_path,
            log_format: file_log_format,
        } = file_config;

        let spreadsheet_id = cli_spreadsheet_id
            .or(file_spreadsheet_id)
            .map(|id| id.trim().to_string())
            .unwrap_or_default();
        anyhow::ensure!(
            !spreadsheet_id.is_empty(),
            "a spreadsheet id is required (--spreadsheet-id or SHEET_ROLLOVER_SPREADSHEET_ID)"
        );

        let store = cli_store.or(file_store).unwrap_or_default();
        let access_token = cli_access_token
            .map(SecretString::new)
            .or(file_access_token)
            .filter(|token| !token.expose().trim().is_empty());
        let api_base_url = cli_api_base_url
            .or(file_api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let memory_seed = cli_memory_seed.or(file_memory_seed);

        let http_bind_address = match cli_http_bind.or(file_http_bind) {
            Some(addr) => addr,
            None => DEFAULT_HTTP_BIND
                .parse()
                .context("default bind address invalid")?,
        };

        let layout = cli_layout.or(file_layout).unwrap_or_default();
        let mapping = ColumnMapping::for_layout(layout, file_columns)
            .with_context(|| format!("invalid {layout} column layout"))?;

        let date_pattern = cli_date_pattern.or(file_date_pattern).unwrap_or_default();
        let write_mode = cli_write_mode.or(file_write_mode).unwrap_or_default();

        let request_timeout_ms = cli_request_timeout_ms
            .or(file_request_timeout_ms)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
        let request_timeout_ms = if request_timeout_ms == 0 {
            None
        } else {
            Some(request_timeout_ms)
        };

        let status_path = cli_status_path
            .or(file_status_path)
            .unwrap_or_else(|| DEFAULT_STATUS_PATH.to_string());
        let trigger_path = cli_trigger_path
            .or(file_trigger_path)
            .unwrap_or_else(|| DEFAULT_TRIGGER_PATH.to_string());
        for (name, path) in [("status_path", &status_path), ("trigger_path", &trigger_path)] {
            anyhow::ensure!(path.starts_with('/'), "{name} must start with '/' (got '{path}')");
            anyhow::ensure!(path != "/health", "{name} conflicts with the health endpoint");
        }
        anyhow::ensure!(
            status_path != trigger_path,
            "status_path and trigger_path must differ"
        );

        let log_format = cli_log_format.or(file_log_format).unwrap_or_default();

        Ok(Self {
            spreadsheet_id,
            store,
            access_token,
            api_base_url,
            memory_seed,
            http_bind_address,
            layout,
            mapping,
            date_pattern,
            write_mode,
            request_timeout_ms,
            status_path,
            trigger_path,
            log_format,
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "sheet-rollover",
    about = "Creates today's dated sheet from the latest one",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_SPREADSHEET_ID",
        value_name = "ID",
        help = "Spreadsheet whose dated sheets are rolled over"
    )]
    pub spreadsheet_id: Option<String>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_STORE",
        value_enum,
        value_name = "KIND",
        help = "Sheet store backend (google or memory)"
    )]
    pub store: Option<StoreKind>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_ACCESS_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true,
        help = "OAuth bearer token for the Google Sheets API"
    )]
    pub access_token: Option<String>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_API_BASE_URL",
        value_name = "URL",
        help = "Google Sheets API base url (default: https://sheets.googleapis.com)"
    )]
    pub api_base_url: Option<String>,

    #[arg(
        long = "seed",
        env = "SHEET_ROLLOVER_MEMORY_SEED",
        value_name = "FILE",
        help = "JSON file with initial sheets for the memory store"
    )]
    pub memory_seed: Option<PathBuf>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_HTTP_BIND",
        value_name = "ADDR",
        help = "HTTP bind address (default: 127.0.0.1:8080)"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_LAYOUT",
        value_enum,
        value_name = "LAYOUT",
        help = "Column layout: inventory, ledger, or custom (columns from the config file)"
    )]
    pub layout: Option<Layout>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_DATE_PATTERN",
        value_enum,
        value_name = "PATTERN",
        help = "Dated sheet titles: strict (YYYY-MM-DD) or lenient (YYYY-M-D)"
    )]
    pub date_pattern: Option<DatePattern>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_WRITE_MODE",
        value_enum,
        value_name = "MODE",
        help = "sequential writes (one call per range) or one batched write"
    )]
    pub write_mode: Option<WriteMode>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_REQUEST_TIMEOUT_MS",
        value_name = "MS",
        help = "Per-call timeout against the sheet store in milliseconds (default: 30000; 0 disables)",
        value_parser = clap::value_parser!(u64)
    )]
    pub request_timeout_ms: Option<u64>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_STATUS_PATH",
        value_name = "PATH",
        help = "Status endpoint the trigger redirects to (default: /status)"
    )]
    pub status_path: Option<String>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_TRIGGER_PATH",
        value_name = "PATH",
        help = "Endpoint that creates today's sheet (default: /create_today)"
    )]
    pub trigger_path: Option<String>,

    #[arg(
        long,
        env = "SHEET_ROLLOVER_LOG_FORMAT",
        value_enum,
        value_name = "FORMAT",
        help = "Log output format (text or json)"
    )]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    spreadsheet_id: Option<String>,
    store: Option<StoreKind>,
    access_token: Option<SecretString>,
    api_base_url: Option<String>,
    memory_seed: Option<PathBuf>,
    http_bind: Option<SocketAddr>,
    layout: Option<Layout>,
    columns: Option<Vec<ColumnSpec>>,
    date_pattern: Option<DatePattern>,
    write_mode: Option<WriteMode>,
    request_timeout_ms: Option<u64>,
    status_path: Option<String>,
    trigger_path: Option<String>,
    log_format: Option<LogFormat>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

#![allow(dead_code)]

use chrono::NaiveDate;
use clap::Parser;
use sheet_rollover::store::Grid;
use sheet_rollover::{CliArgs, InMemoryStore, ServerConfig, SnapshotOptions, SnapshotService};
use std::sync::Arc;

pub const SPREADSHEET_ID: &str = "test-spreadsheet";

pub fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn inventory_header() -> Vec<String> {
    [
        "Fecha",
        "Producto",
        "Valor unitario",
        "Utilidad",
        "Valor total",
        "Vendidas",
        "Restantes",
        "Inicial",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Inventory sheet as it looks after a day of sales.
pub fn inventory_sheet(day: &str) -> Grid {
    let mut rows = vec![inventory_header()];
    rows.extend(grid(&[
        &[day, "Widget", "10", "20", "=C2*(1+D2/100)*F2", "3", "=H2-F2", "10"],
        &[day, "Gadget", "4.5", "50", "=C3*(1+D3/100)*F3", "", "=H3-F3", "25"],
    ]));
    rows
}

pub fn ledger_sheet(day: &str) -> Grid {
    let mut rows = grid(&[&[
        "Fecha", "Cliente", "Prestamo", "Interes", "Abono", "Saldo", "Acumulado",
    ]]);
    rows.extend(grid(&[
        &[day, "Ana", "100", "5", "20", "=C2+D2-E2", "300"],
        &[day, "Luis", "50"],
    ]));
    rows
}

/// Config parsed the way the binaries parse it, pinned to the memory store.
pub fn config_with(extra: &[&str]) -> ServerConfig {
    let mut args = vec![
        "sheet-rollover",
        "--spreadsheet-id",
        SPREADSHEET_ID,
        "--store",
        "memory",
    ];
    args.extend_from_slice(extra);
    ServerConfig::from_args(CliArgs::parse_from(args)).expect("valid config")
}

pub fn service_with(store: Arc<InMemoryStore>, extra: &[&str]) -> SnapshotService {
    let config = config_with(extra);
    SnapshotService::new(store, SnapshotOptions::from_config(&config)).expect("valid mapping")
}

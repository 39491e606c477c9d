use crate::config::ServerConfig;
use crate::selector::{YearMonth, select_reference_sheet};
use crate::snapshot::{SnapshotOptions, SnapshotService};
use crate::store::build_store;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::{Value, json};

pub fn build_service(config: &ServerConfig) -> Result<SnapshotService> {
    let store = build_store(config)?;
    Ok(SnapshotService::new(store, SnapshotOptions::from_config(config))?)
}

fn resolve_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

pub async fn run(service: &SnapshotService, date: Option<NaiveDate>) -> Result<Value> {
    let report = service.run_daily_snapshot(resolve_date(date)).await?;
    Ok(serde_json::to_value(report)?)
}

pub async fn preview(service: &SnapshotService, date: Option<NaiveDate>) -> Result<Value> {
    let snapshot = service.preview(resolve_date(date)).await?;
    Ok(serde_json::to_value(snapshot)?)
}

#[derive(Debug, Serialize)]
struct SheetEntry {
    title: String,
    date: Option<NaiveDate>,
}

pub async fn list_sheets(service: &SnapshotService) -> Result<Value> {
    let pattern = service.options().date_pattern;
    let names = service.list_sheet_names().await?;
    let reference = select_reference_sheet(&names, pattern).ok().map(|sheet| sheet.name);
    let sheets: Vec<SheetEntry> = names
        .into_iter()
        .map(|title| SheetEntry {
            date: pattern.parse(&title),
            title,
        })
        .collect();
    Ok(json!({
        "date_pattern": pattern,
        "reference": reference,
        "sheets": sheets,
    }))
}

pub async fn select(service: &SnapshotService, date: Option<NaiveDate>) -> Result<Value> {
    let today = resolve_date(date);
    let selection = service.select(today).await?;
    let same_month = selection.reference.month() == YearMonth::from(today);
    Ok(json!({
        "date_pattern": service.options().date_pattern,
        "reference": selection.reference,
        "next_sheet": selection.sheet_name,
        "same_month": same_month,
        "reference_ahead": selection.reference_ahead,
    }))
}

use assert_matches::assert_matches;
use sheet_rollover::store::{InMemoryStore, StoreOp, ValueInputMode};
use sheet_rollover::{SnapshotError, StoreError};
use std::sync::Arc;
use std::time::Duration;

mod support;
use support::{date, grid, inventory_header, inventory_sheet, ledger_sheet, service_with};

fn inventory_store() -> Arc<InMemoryStore> {
    Arc::new(
        InMemoryStore::new()
            .with_sheet("Resumen", grid(&[&["total", "=SUM(A1:A9)"]]))
            .with_sheet("2024-01-05", inventory_sheet("2024-01-05"))
            .with_sheet("2024-01-06", inventory_sheet("2024-01-06")),
    )
}

#[tokio::test(flavor = "current_thread")]
async fn creates_todays_sheet_from_the_latest_one() {
    let store = inventory_store();
    let service = service_with(store.clone(), &[]);

    let report = service
        .run_daily_snapshot(date(2024, 1, 7))
        .await
        .expect("snapshot succeeds");

    assert_eq!(report.sheet_name, "2024-01-07");
    assert_eq!(report.reference, "2024-01-06");
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.formula_columns, vec!["E", "G"]);
    assert_eq!(
        report.ranges_written,
        vec![
            "'2024-01-07'!A1",
            "'2024-01-07'!A2",
            "'2024-01-07'!E2",
            "'2024-01-07'!G2",
        ]
    );
    assert!(report.finished_at >= report.started_at);

    let mut expected = vec![inventory_header()];
    expected.extend(grid(&[
        &["2024-01-07", "Widget", "10", "20", "=C2*(1+D2/100)*F2", "", "=H2-F2", "10"],
        &["2024-01-07", "Gadget", "4.5", "50", "=C3*(1+D3/100)*F3", "", "=H3-F3", "25"],
    ]));
    assert_eq!(store.sheet("2024-01-07"), Some(expected));

    let names = store.sheet_names();
    assert_eq!(names.last().map(String::as_str), Some("2024-01-07"));
    assert!(!service.is_running());
}

#[tokio::test(flavor = "current_thread")]
async fn every_write_is_user_entered() {
    let store = inventory_store();
    let service = service_with(store.clone(), &[]);
    service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap();

    let writes: Vec<_> = store
        .calls()
        .into_iter()
        .filter(|call| call.op == StoreOp::Write)
        .collect();
    assert_eq!(writes.len(), 4);
    assert!(
        writes
            .iter()
            .all(|call| call.mode == Some(ValueInputMode::UserEntered))
    );
}

#[tokio::test(flavor = "current_thread")]
async fn reads_cover_the_mapped_source_width() {
    let store = inventory_store();
    let service = service_with(store.clone(), &[]);
    service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap();

    let reads: Vec<_> = store
        .calls()
        .into_iter()
        .filter(|call| call.op == StoreOp::Read)
        .map(|call| call.target)
        .collect();
    assert_eq!(reads, vec!["'2024-01-06'!A1:H1", "'2024-01-06'!A2:H"]);
}

#[tokio::test(flavor = "current_thread")]
async fn empty_spreadsheet_has_no_reference() {
    let store = Arc::new(InMemoryStore::new().with_sheet("Notes", grid(&[&["x"]])));
    let service = service_with(store.clone(), &[]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert_matches!(err, SnapshotError::NoReferenceSheet);
    assert_eq!(store.count_calls(StoreOp::Create), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn existing_sheet_for_today_is_a_duplicate() {
    let store = inventory_store();
    store.insert_sheet("2024-01-07", grid(&[&["already here"]]));
    let service = service_with(store.clone(), &[]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert_matches!(err, SnapshotError::DuplicateSheet { ref name } if name == "2024-01-07");
    assert_eq!(store.count_calls(StoreOp::Create), 0);
    assert_eq!(store.count_calls(StoreOp::Read), 0);
    assert_eq!(store.sheet("2024-01-07"), Some(grid(&[&["already here"]])));
}

#[tokio::test(flavor = "current_thread")]
async fn ledger_running_total_accumulates_within_the_month() {
    let store = Arc::new(InMemoryStore::new().with_sheet("2024-01-06", ledger_sheet("2024-01-06")));
    let service = service_with(store.clone(), &["--layout", "ledger"]);

    service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap();

    let sheet = store.sheet("2024-01-07").expect("sheet created");
    assert_eq!(
        sheet[1],
        vec!["2024-01-07", "Ana", "100", "5", "0", "=C2+D2-E2", "='2024-01-06'!G2+100"]
    );
    assert_eq!(
        sheet[2],
        vec!["2024-01-07", "Luis", "50", "0", "0", "=C3+D3-E3", "='2024-01-06'!G3+50"]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn ledger_running_total_restarts_in_a_new_month() {
    let store = Arc::new(InMemoryStore::new().with_sheet("2024-01-31", ledger_sheet("2024-01-31")));
    let service = service_with(store.clone(), &["--layout", "ledger"]);

    service.run_daily_snapshot(date(2024, 2, 1)).await.unwrap();

    let sheet = store.sheet("2024-02-01").expect("sheet created");
    assert_eq!(sheet[1][6], "100");
    assert_eq!(sheet[2][6], "50");
}

#[tokio::test(flavor = "current_thread")]
async fn failed_write_reports_what_was_already_written() {
    let store = inventory_store();
    store.fail_on(StoreOp::Write, Some("'2024-01-07'!E"), "quota exceeded");
    let service = service_with(store.clone(), &[]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert_matches!(
        &err,
        SnapshotError::WriteFailed { range, written, source: StoreError::Rejected(msg) } => {
            assert_eq!(range, "'2024-01-07'!E2");
            assert_eq!(written, &vec!["'2024-01-07'!A1".to_string(), "'2024-01-07'!A2".to_string()]);
            assert_eq!(msg, "quota exceeded");
        }
    );
    assert_eq!(err.written_ranges().len(), 2);

    // No rollback: header and body stay, formulas never land.
    let sheet = store.sheet("2024-01-07").expect("sheet left behind");
    assert_eq!(sheet[0], inventory_header());
    assert_eq!(sheet[1][4], "");
    assert_eq!(sheet[1][6], "");
    assert!(!service.is_running());
}

#[tokio::test(flavor = "current_thread")]
async fn failed_read_leaves_an_empty_sheet() {
    let store = inventory_store();
    store.fail_on(StoreOp::Read, Some("'2024-01-06'!A2"), "backend error");
    let service = service_with(store.clone(), &[]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert_matches!(err, SnapshotError::ReadFailed { ref range, .. } if range == "'2024-01-06'!A2:H");
    assert_eq!(store.sheet("2024-01-07"), Some(Vec::new()));
    assert_eq!(store.count_calls(StoreOp::Write), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn failed_create_stops_before_reading() {
    let store = inventory_store();
    store.fail_on(StoreOp::Create, None, "permission denied");
    let service = service_with(store.clone(), &[]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert_matches!(err, SnapshotError::CreateFailed { ref sheet, .. } if sheet == "2024-01-07");
    assert_eq!(store.count_calls(StoreOp::Read), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn failed_listing_is_a_read_failure() {
    let store = inventory_store();
    store.fail_on(StoreOp::List, None, "unauthorized");
    let service = service_with(store.clone(), &[]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert_matches!(err, SnapshotError::ReadFailed { ref range, .. } if range == "sheets");
}

#[tokio::test(flavor = "current_thread")]
async fn batched_mode_issues_a_single_call() {
    let store = inventory_store();
    let service = service_with(store.clone(), &["--write-mode", "batched"]);

    let report = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap();
    assert_eq!(report.ranges_written.len(), 4);
    assert_eq!(store.count_calls(StoreOp::BatchWrite), 1);
    assert_eq!(store.count_calls(StoreOp::Write), 0);

    let sheet = store.sheet("2024-01-07").expect("sheet created");
    assert_eq!(sheet[2][4], "=C3*(1+D3/100)*F3");
}

#[tokio::test(flavor = "current_thread")]
async fn batched_failure_writes_nothing() {
    let store = inventory_store();
    store.fail_on(StoreOp::BatchWrite, None, "quota exceeded");
    let service = service_with(store.clone(), &["--write-mode", "batched"]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert_matches!(err, SnapshotError::WriteFailed { ref written, .. } if written.is_empty());
    assert_eq!(store.sheet("2024-01-07"), Some(Vec::new()));
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_trigger_is_turned_away() {
    let store = inventory_store();
    store.set_delay(Some(Duration::from_millis(20)));
    let service = service_with(store.clone(), &[]);

    let (first, second) = tokio::join!(
        service.run_daily_snapshot(date(2024, 1, 7)),
        service.run_daily_snapshot(date(2024, 1, 7)),
    );
    assert!(first.is_ok());
    assert_matches!(second, Err(SnapshotError::Busy { ref spreadsheet_id }) if spreadsheet_id == support::SPREADSHEET_ID);
    assert_eq!(store.count_calls(StoreOp::Create), 1);
    assert!(!service.is_running());
}

#[tokio::test(flavor = "current_thread")]
async fn slow_store_times_out() {
    let store = inventory_store();
    store.set_delay(Some(Duration::from_millis(200)));
    let service = service_with(store.clone(), &["--request-timeout-ms", "10"]);

    let err = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap_err();
    assert!(err.is_timeout());
    assert_matches!(
        err,
        SnapshotError::ReadFailed { source: StoreError::Timeout { after_ms: 10 }, .. }
    );
    assert!(!service.is_running());
}

#[tokio::test(flavor = "current_thread")]
async fn header_only_reference_writes_only_the_header() {
    let store = Arc::new(InMemoryStore::new().with_sheet("2024-01-06", vec![inventory_header()]));
    let service = service_with(store.clone(), &[]);

    let report = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap();
    assert_eq!(report.rows_written, 0);
    assert_eq!(report.ranges_written, vec!["'2024-01-07'!A1"]);
    assert_eq!(store.sheet("2024-01-07"), Some(vec![inventory_header()]));
}

#[tokio::test(flavor = "current_thread")]
async fn missing_header_skips_the_header_write() {
    let mut rows = inventory_sheet("2024-01-06");
    rows[0] = Vec::new();
    let store = Arc::new(InMemoryStore::new().with_sheet("2024-01-06", rows));
    let service = service_with(store.clone(), &[]);

    let report = service.run_daily_snapshot(date(2024, 1, 7)).await.unwrap();
    assert_eq!(report.ranges_written.first().map(String::as_str), Some("'2024-01-07'!A2"));
    assert_eq!(report.ranges_written.len(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn preview_builds_without_touching_the_spreadsheet() {
    let store = inventory_store();
    let service = service_with(store.clone(), &[]);

    let snapshot = service.preview(date(2024, 1, 7)).await.unwrap();
    assert_eq!(snapshot.sheet_name, "2024-01-07");
    assert_eq!(snapshot.body.len(), 2);
    assert_eq!(snapshot.last_row(), Some(3));
    assert_eq!(store.count_calls(StoreOp::Create), 0);
    assert_eq!(store.count_calls(StoreOp::Write), 0);
    assert_eq!(store.sheet("2024-01-07"), None);
}

#[tokio::test(flavor = "current_thread")]
async fn lenient_pattern_compares_dates_not_text() {
    let store = Arc::new(
        InMemoryStore::new()
            .with_sheet("2024-9-2", inventory_sheet("2024-9-2"))
            .with_sheet("2024-10-1", inventory_sheet("2024-10-1")),
    );
    let service = service_with(store.clone(), &["--date-pattern", "lenient"]);

    let report = service.run_daily_snapshot(date(2024, 10, 2)).await.unwrap();
    assert_eq!(report.reference, "2024-10-1");
    assert_eq!(report.sheet_name, "2024-10-02");

    let err = service.run_daily_snapshot(date(2024, 10, 1)).await.unwrap_err();
    assert_matches!(err, SnapshotError::DuplicateSheet { ref name } if name == "2024-10-1");
}

#[tokio::test(flavor = "current_thread")]
async fn strict_pattern_ignores_unpadded_titles() {
    let store = Arc::new(
        InMemoryStore::new()
            .with_sheet("2024-01-06", inventory_sheet("2024-01-06"))
            .with_sheet("2024-1-9", inventory_sheet("2024-1-9")),
    );
    let service = service_with(store.clone(), &[]);

    let report = service.run_daily_snapshot(date(2024, 1, 10)).await.unwrap();
    assert_eq!(report.reference, "2024-01-06");
}

#[tokio::test(flavor = "current_thread")]
async fn reference_dated_after_today_is_flagged() {
    let store = Arc::new(
        InMemoryStore::new()
            .with_sheet("2024-01-06", inventory_sheet("2024-01-06"))
            .with_sheet("2024-01-09", inventory_sheet("2024-01-09")),
    );
    let service = service_with(store.clone(), &[]);

    let selection = service.select(date(2024, 1, 7)).await.unwrap();
    assert_eq!(selection.reference.name, "2024-01-09");
    assert_eq!(selection.sheet_name, "2024-01-07");
    assert!(selection.reference_ahead);

    let selection = service.select(date(2024, 1, 10)).await.unwrap();
    assert!(!selection.reference_ahead);
}

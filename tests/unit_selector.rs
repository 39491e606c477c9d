use assert_matches::assert_matches;
use sheet_rollover::selector::{
    DatePattern, SelectError, dated_sheets, ensure_sheet_absent, select_reference_sheet,
    sheet_name_for,
};

mod support;
use support::date;

#[test]
fn picks_the_latest_dated_sheet() {
    let names = ["2024-01-05", "Resumen", "2024-01-06", "Plantilla"];
    let reference = select_reference_sheet(names, DatePattern::Strict).unwrap();
    assert_eq!(reference.name, "2024-01-06");
    assert_eq!(reference.date, date(2024, 1, 6));
}

#[test]
fn listing_order_does_not_matter() {
    let forward = ["2023-12-31", "2024-01-02", "2024-01-10"];
    let mut backward = forward;
    backward.reverse();
    let a = select_reference_sheet(forward, DatePattern::Strict).unwrap();
    let b = select_reference_sheet(backward, DatePattern::Strict).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.name, "2024-01-10");
}

#[test]
fn selection_is_repeatable() {
    let names = vec!["2024-02-01".to_string(), "2024-01-31".to_string()];
    let first = select_reference_sheet(&names, DatePattern::Strict).unwrap();
    let second = select_reference_sheet(&names, DatePattern::Strict).unwrap();
    assert_eq!(first, second);
}

#[test]
fn nothing_dated_is_not_found() {
    assert_matches!(
        select_reference_sheet(Vec::<String>::new(), DatePattern::Strict),
        Err(SelectError::NotFound { pattern: DatePattern::Strict })
    );
    assert_matches!(
        select_reference_sheet(["Sheet1", "2024-01", "2024-01-06 copy"], DatePattern::Lenient),
        Err(SelectError::NotFound { .. })
    );
}

#[test]
fn undated_titles_never_influence_the_result() {
    let with_noise = ["zzzz", "2024-01-06", "9999-99-99", "2024-13-01", "2024-02-30"];
    let reference = select_reference_sheet(with_noise, DatePattern::Strict).unwrap();
    assert_eq!(reference.name, "2024-01-06");
}

#[test]
fn strict_requires_zero_padding() {
    assert_eq!(DatePattern::Strict.parse("2024-01-06"), Some(date(2024, 1, 6)));
    assert_eq!(DatePattern::Strict.parse("2024-1-6"), None);
    assert_eq!(DatePattern::Strict.parse(" 2024-01-06"), None);
    assert_eq!(DatePattern::Lenient.parse("2024-1-6"), Some(date(2024, 1, 6)));
    assert_eq!(DatePattern::Lenient.parse("2024-01-06"), Some(date(2024, 1, 6)));
}

#[test]
fn lenient_compares_dates_not_strings() {
    let names = ["2024-10-1", "2024-9-2"];
    let reference = select_reference_sheet(names, DatePattern::Lenient).unwrap();
    assert_eq!(reference.name, "2024-10-1");

    let dated = dated_sheets(names, DatePattern::Strict);
    assert!(dated.is_empty());
}

#[test]
fn same_day_ties_go_to_the_greatest_title() {
    let names = ["2024-1-6", "2024-01-06"];
    let reference = select_reference_sheet(names, DatePattern::Lenient).unwrap();
    assert_eq!(reference.name, "2024-1-6");
}

#[test]
fn new_titles_are_always_padded() {
    assert_eq!(sheet_name_for(date(2024, 3, 7)), "2024-03-07");
}

#[test]
fn duplicate_guard_catches_same_day_titles() {
    let today = date(2024, 1, 7);
    assert_eq!(
        ensure_sheet_absent(["2024-01-06"], today, DatePattern::Strict).unwrap(),
        "2024-01-07"
    );
    assert_matches!(
        ensure_sheet_absent(["2024-01-06", "2024-01-07"], today, DatePattern::Strict),
        Err(SelectError::AlreadyExists { name }) if name == "2024-01-07"
    );
    assert_matches!(
        ensure_sheet_absent(["2024-1-7"], today, DatePattern::Lenient),
        Err(SelectError::AlreadyExists { name }) if name == "2024-1-7"
    );
    assert!(ensure_sheet_absent(["2024-1-7"], today, DatePattern::Strict).is_ok());
}

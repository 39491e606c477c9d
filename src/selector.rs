//! Picks the sheet a new day's sheet is copied from.
//!
//! Dated sheets are compared as calendar dates, never as strings: with unpadded names
//! `"2024-9-2"` sorts after `"2024-10-1"` lexically even though it is older.

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

static STRICT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("regex"));
static LENIENT_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("regex"));

/// Which sheet titles count as dated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePattern {
    /// `YYYY-MM-DD` only.
    #[default]
    Strict,
    /// `YYYY-M-D` with optional zero padding.
    Lenient,
}

impl DatePattern {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }

    /// Parse a sheet title into the date it names, rejecting impossible dates.
    pub fn parse(self, name: &str) -> Option<NaiveDate> {
        let re = match self {
            Self::Strict => &*STRICT_DATE_RE,
            Self::Lenient => &*LENIENT_DATE_RE,
        };
        let caps = re.captures(name)?;
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

impl fmt::Display for DatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Title a new sheet gets for `date`. Always zero padded, whatever the pattern.
pub fn sheet_name_for(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatedSheet {
    pub name: String,
    pub date: NaiveDate,
}

impl DatedSheet {
    pub fn month(&self) -> YearMonth {
        YearMonth::from(self.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no sheet title matches the {pattern} date pattern")]
    NotFound { pattern: DatePattern },
    #[error("sheet '{name}' already exists")]
    AlreadyExists { name: String },
}

pub fn dated_sheets<I, S>(names: I, pattern: DatePattern) -> Vec<DatedSheet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            pattern.parse(name).map(|date| DatedSheet {
                name: name.to_string(),
                date,
            })
        })
        .collect()
}

/// The latest dated sheet. Ties between titles naming the same day (only possible with
/// the lenient pattern) go to the lexically greatest title.
pub fn select_reference_sheet<I, S>(names: I, pattern: DatePattern) -> Result<DatedSheet, SelectError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dated_sheets(names, pattern)
        .into_iter()
        .max_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)))
        .ok_or(SelectError::NotFound { pattern })
}

/// Guard against a second sheet for `today`. Returns the title to create.
pub fn ensure_sheet_absent<I, S>(
    names: I,
    today: NaiveDate,
    pattern: DatePattern,
) -> Result<String, SelectError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let target = sheet_name_for(today);
    for name in names {
        let name = name.as_ref();
        if name == target || pattern.parse(name) == Some(today) {
            return Err(SelectError::AlreadyExists {
                name: name.to_string(),
            });
        }
    }
    Ok(target)
}

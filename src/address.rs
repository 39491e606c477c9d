use std::borrow::Cow;
use std::fmt;

/// Convert a 1-based column number into its A1 letters (`1` -> `A`, `27` -> `AA`).
pub fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Parse A1 column letters into a 1-based column number.
pub fn col_from_letters(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 3 {
        return None;
    }
    let mut col = 0;
    for c in s.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(col)
}

/// Quote a sheet title for use in an A1 range when it contains anything beyond
/// `[A-Za-z0-9_]` or starts with a digit. Embedded quotes are doubled.
pub fn quote_sheet_name(name: &str) -> Cow<'_, str> {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("'{}'", name.replace('\'', "''")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub col: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let split_idx = s.find(|c: char| c.is_ascii_digit())?;
        let (col_str, row_str) = s.split_at(split_idx);
        let row = row_str.parse::<u32>().ok().filter(|row| *row > 0)?;
        let col = col_from_letters(col_str)?;
        Some(Self { col, row })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

/// Bottom-right bound of a range. A missing row means "to the last populated row".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeEnd {
    pub col: u32,
    pub row: Option<u32>,
}

/// `<sheet>!<top-left>[:<bottom-right>]`, the addressing the sheet store understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub sheet: String,
    pub start: CellRef,
    pub end: Option<RangeEnd>,
}

impl RangeSpec {
    /// A single anchor cell; writes expand from it.
    pub fn anchor(sheet: &str, col: u32, row: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef::new(col, row),
            end: None,
        }
    }

    pub fn row_span(sheet: &str, row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef::new(first_col, row),
            end: Some(RangeEnd {
                col: last_col,
                row: Some(row),
            }),
        }
    }

    /// Columns `first_col..=last_col` from `first_row` down to the last populated row.
    pub fn open_ended(sheet: &str, first_row: u32, first_col: u32, last_col: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            start: CellRef::new(first_col, first_row),
            end: Some(RangeEnd {
                col: last_col,
                row: None,
            }),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (sheet, cells) = split_sheet(s)?;
        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };
        let start = CellRef::parse(start)?;
        let end = match end {
            None => None,
            Some(end) => match CellRef::parse(end) {
                Some(cell) => Some(RangeEnd {
                    col: cell.col,
                    row: Some(cell.row),
                }),
                None => Some(RangeEnd {
                    col: col_from_letters(end)?,
                    row: None,
                }),
            },
        };
        Some(Self { sheet, start, end })
    }
}

fn split_sheet(s: &str) -> Option<(String, &str)> {
    if let Some(rest) = s.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            if c != '\'' {
                name.push(c);
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                name.push('\'');
                continue;
            }
            let cells = rest[idx + 1..].strip_prefix('!')?;
            return Some((name, cells));
        }
        None
    } else {
        let (sheet, cells) = s.rsplit_once('!')?;
        Some((sheet.to_string(), cells))
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", quote_sheet_name(&self.sheet), self.start)?;
        match self.end {
            Some(RangeEnd { col, row: Some(row) }) => {
                write!(f, ":{}{}", column_letters(col), row)
            }
            Some(RangeEnd { col, row: None }) => write!(f, ":{}", column_letters(col)),
            None => Ok(()),
        }
    }
}

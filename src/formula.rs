use crate::address::{col_from_letters, quote_sheet_name};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Formula text stamped into a derived column, one cell per body row.
///
/// Placeholders:
/// - `{row}`: destination row number (the first body row is 2)
/// - `{ref}`: reference sheet title, quoted for A1 use
/// - `{today}`: title of the sheet being created
/// - `{value:X}`: literal already placed in column `X` of the same new row
///
/// `{{` and `}}` produce literal braces. When `new_month` is set and the reference sheet
/// belongs to an earlier month than today, it replaces `same_month`, which lets running
/// totals restart each month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaTemplate {
    pub same_month: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_month: Option<String>,
}

/// Values available while rendering one cell.
#[derive(Debug, Clone, Copy)]
pub struct FormulaContext<'a> {
    pub row: u32,
    pub reference: &'a str,
    pub today: &'a str,
    pub same_month: bool,
    pub values: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Row,
    Reference,
    Today,
    Value(usize),
}

impl FormulaTemplate {
    pub fn flat(text: impl Into<String>) -> Self {
        Self {
            same_month: text.into(),
            new_month: None,
        }
    }

    pub fn monthly(same_month: impl Into<String>, new_month: impl Into<String>) -> Self {
        Self {
            same_month: same_month.into(),
            new_month: Some(new_month.into()),
        }
    }

    fn variant(&self, same_month: bool) -> &str {
        match (&self.new_month, same_month) {
            (Some(new_month), false) => new_month,
            _ => &self.same_month,
        }
    }

    /// Check both variants against a row of `width` columns. `{value:X}` may only point
    /// at columns in `allowed_value_columns` (0-based).
    pub fn validate(&self, width: usize, allowed_value_columns: &[usize]) -> Result<()> {
        let variants = std::iter::once(self.same_month.as_str()).chain(self.new_month.as_deref());
        for text in variants {
            for segment in parse_segments(text)? {
                if let Segment::Value(idx) = segment {
                    if idx >= width {
                        bail!("{{value:..}} points past the last column in '{text}'");
                    }
                    if !allowed_value_columns.contains(&idx) {
                        bail!("{{value:..}} must reference a literal column in '{text}'");
                    }
                }
            }
        }
        Ok(())
    }

    pub fn render(&self, ctx: &FormulaContext<'_>) -> Result<String> {
        let text = self.variant(ctx.same_month);
        let mut out = String::with_capacity(text.len() + 8);
        for segment in parse_segments(text)? {
            match segment {
                Segment::Literal(lit) => out.push_str(&lit),
                Segment::Row => out.push_str(&ctx.row.to_string()),
                Segment::Reference => out.push_str(&quote_sheet_name(ctx.reference)),
                Segment::Today => out.push_str(ctx.today),
                Segment::Value(idx) => {
                    out.push_str(ctx.values.get(idx).map(String::as_str).unwrap_or(""))
                }
            }
        }
        Ok(out)
    }
}

fn parse_segments(text: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    bail!("unclosed placeholder in '{text}'");
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_placeholder(&name, text)?);
            }
            '}' => bail!("unmatched '}}' in '{text}'"),
            other => literal.push(other),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_placeholder(name: &str, text: &str) -> Result<Segment> {
    let name = name.trim();
    match name {
        "row" => Ok(Segment::Row),
        "ref" => Ok(Segment::Reference),
        "today" => Ok(Segment::Today),
        _ => {
            let Some(column) = name.strip_prefix("value:") else {
                bail!("unknown placeholder '{{{name}}}' in '{text}'");
            };
            let col = col_from_letters(column.trim())
                .ok_or_else(|| anyhow::anyhow!("invalid column '{column}' in '{text}'"))?;
            Ok(Segment::Value(col as usize - 1))
        }
    }
}

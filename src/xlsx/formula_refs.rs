//! Relative reference shifting for shared formulas.
//!
//! A shared formula is written once on its anchor cell; every other cell in the
//! group sees the same text with its relative references moved by the cell's
//! offset from the anchor. `$`-anchored parts stay put.

use crate::workbook::address::{column_index, column_letters, MAX_COL, MAX_ROW};

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Move every relative A1 reference in `formula` by (`row_delta`, `col_delta`).
///
/// References pushed off the grid become `#REF!`, as Excel does.
pub(crate) fn shift_references(formula: &str, row_delta: i64, col_delta: i64) -> String {
    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' || c == '\'' {
            // string literal or quoted sheet name; a doubled quote is an escape
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == c {
                    if chars.get(i + 1) == Some(&c) {
                        out.push(c);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }

        let starts_token = i == 0 || !is_ident_char(chars[i - 1]);
        if starts_token && (c == '$' || c.is_ascii_alphanumeric()) {
            if let Some(range) = match_line_range(&chars[i..]) {
                if ends_reference(chars.get(i + range.len).copied()) {
                    out.push_str(&range.shifted(row_delta, col_delta));
                    i += range.len;
                    continue;
                }
            }
        }
        if starts_token && (c == '$' || c.is_ascii_alphabetic()) {
            if let Some(reference) = match_reference(&chars[i..]) {
                if ends_reference(chars.get(i + reference.len).copied()) {
                    out.push_str(&reference.shifted(row_delta, col_delta));
                    i += reference.len;
                    continue;
                }
            }
        }

        if is_ident_char(c) {
            while i < chars.len() && is_ident_char(chars[i]) {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

/// A reference is not followed by more of a name, a call or a sheet separator
fn ends_reference(next: Option<char>) -> bool {
    !matches!(next, Some(n) if is_ident_char(n) || n == '(' || n == '!')
}

struct Reference {
    col: u32,
    row: u32,
    col_absolute: bool,
    row_absolute: bool,
    len: usize,
}

impl Reference {
    fn shifted(&self, row_delta: i64, col_delta: i64) -> String {
        let col = if self.col_absolute {
            i64::from(self.col)
        } else {
            i64::from(self.col) + col_delta
        };
        let row = if self.row_absolute {
            i64::from(self.row)
        } else {
            i64::from(self.row) + row_delta
        };
        if col < 1 || col > i64::from(MAX_COL) || row < 1 || row > i64::from(MAX_ROW) {
            return "#REF!".to_string();
        }
        format!(
            "{}{}{}{}",
            if self.col_absolute { "$" } else { "" },
            column_letters(col as u32),
            if self.row_absolute { "$" } else { "" },
            row
        )
    }
}

/// `$?[A-Z]{1,3}$?[0-9]+` at the start of `chars`
fn match_reference(chars: &[char]) -> Option<Reference> {
    let mut i = 0;
    let col_absolute = chars.first() == Some(&'$');
    if col_absolute {
        i += 1;
    }
    let letters_start = i;
    while i < chars.len() && chars[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters: String = chars[letters_start..i].iter().collect();
    let row_absolute = chars.get(i) == Some(&'$');
    if row_absolute {
        i += 1;
    }
    let digits_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    let digits: String = chars[digits_start..i].iter().collect();

    let col = column_index(&letters)?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > MAX_ROW {
        return None;
    }
    Some(Reference {
        col,
        row,
        col_absolute,
        row_absolute,
        len: i,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Column,
    Row,
}

/// One side of a whole-column or whole-row range
struct LineBound {
    axis: Axis,
    index: u32,
    absolute: bool,
}

impl LineBound {
    fn shifted(&self, row_delta: i64, col_delta: i64) -> Option<String> {
        let (delta, max) = match self.axis {
            Axis::Column => (col_delta, MAX_COL),
            Axis::Row => (row_delta, MAX_ROW),
        };
        let index = if self.absolute {
            i64::from(self.index)
        } else {
            i64::from(self.index) + delta
        };
        if index < 1 || index > i64::from(max) {
            return None;
        }
        let text = match self.axis {
            Axis::Column => column_letters(index as u32),
            Axis::Row => index.to_string(),
        };
        Some(format!("{}{}", if self.absolute { "$" } else { "" }, text))
    }
}

/// `A:C` or `3:7`, each side optionally `$`-anchored
struct LineRange {
    first: LineBound,
    last: LineBound,
    len: usize,
}

impl LineRange {
    fn shifted(&self, row_delta: i64, col_delta: i64) -> String {
        match (
            self.first.shifted(row_delta, col_delta),
            self.last.shifted(row_delta, col_delta),
        ) {
            (Some(first), Some(last)) => format!("{}:{}", first, last),
            _ => "#REF!".to_string(),
        }
    }
}

fn match_line_range(chars: &[char]) -> Option<LineRange> {
    let (first, colon) = match_line_bound(chars, 0)?;
    if chars.get(colon) != Some(&':') {
        return None;
    }
    let (last, len) = match_line_bound(chars, colon + 1)?;
    if first.axis != last.axis {
        return None;
    }
    Some(LineRange { first, last, len })
}

fn match_line_bound(chars: &[char], start: usize) -> Option<(LineBound, usize)> {
    let mut i = start;
    let absolute = chars.get(i) == Some(&'$');
    if absolute {
        i += 1;
    }
    let axis = match chars.get(i) {
        Some(c) if c.is_ascii_alphabetic() => Axis::Column,
        Some(c) if c.is_ascii_digit() => Axis::Row,
        _ => return None,
    };
    let run_start = i;
    while i < chars.len()
        && match axis {
            Axis::Column => chars[i].is_ascii_alphabetic(),
            Axis::Row => chars[i].is_ascii_digit(),
        }
    {
        i += 1;
    }
    let text: String = chars[run_start..i].iter().collect();
    let index = match axis {
        Axis::Column => column_index(&text)?,
        Axis::Row => text.parse().ok().filter(|row| (1..=MAX_ROW).contains(row))?,
    };
    Some((LineBound { axis, index, absolute }, i))
}

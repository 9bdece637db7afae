//! A1-style cell addressing
//!
//! Rows and columns are 1-indexed throughout the crate (A1 = row 1, column 1),
//! matching the `r` attributes in worksheet XML.

use std::fmt;

/// Largest column Excel accepts (XFD)
pub const MAX_COL: u32 = 16_384;
/// Largest row Excel accepts
pub const MAX_ROW: u32 = 1_048_576;

/// A cell position. Ordering is row-major, which is also worksheet XML order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse `B4`, `$B$4` or `b4`
    pub fn parse(a1: &str) -> Option<Self> {
        let s = a1.trim();
        let bytes = s.as_bytes();
        let mut i = 0;
        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }
        let letters_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let letters = &s[letters_start..i];
        if bytes.get(i) == Some(&b'$') {
            i += 1;
        }
        let digits = &s[i..];
        if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let col = column_index(letters)?;
        let row: u32 = digits.parse().ok()?;
        if row == 0 || row > MAX_ROW {
            return None;
        }
        Some(Self { row, col })
    }

    pub fn to_a1(&self) -> String {
        format!("{}{}", column_letters(self.col), self.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

/// An inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self {
            start: CellRef::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellRef::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// Parse `B4:B99`, `$B$4:$B$99` or a single cell `B4`
    pub fn parse(a1: &str) -> Option<Self> {
        match a1.split_once(':') {
            Some((first, last)) => Some(Self::new(CellRef::parse(first)?, CellRef::parse(last)?)),
            None => {
                let cell = CellRef::parse(a1)?;
                Some(Self::new(cell, cell))
            }
        }
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// `B4:B99`, or `B4` for a single cell
    pub fn to_a1(&self) -> String {
        if self.start == self.end {
            self.start.to_a1()
        } else {
            format!("{}:{}", self.start, self.end)
        }
    }
}

/// 1 → A, 26 → Z, 27 → AA
pub fn column_letters(col: u32) -> String {
    let mut result = String::new();
    let mut idx = col.max(1) - 1;

    loop {
        let remainder = idx % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }

    result
}

/// A → 1, Z → 26, AA → 27. Case-insensitive; `None` past XFD.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut col: u32 = 0;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1);
    }
    (col <= MAX_COL).then_some(col)
}

/// Strip `$` anchors from every reference in an `sqref` list: `$B$4:$B$99` → `B4:B99`
pub fn normalize_sqref(sqref: &str) -> String {
    sqref
        .split_whitespace()
        .map(|part| part.replace('$', ""))
        .collect::<Vec<_>>()
        .join(" ")
}

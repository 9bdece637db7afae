//! Cell values and number formats

/// Number format every cell has until told otherwise
pub const GENERAL: &str = "General";

/// The value held by a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    /// Numbers and dates alike; a date is a serial number with a date format
    Number(f64),
    Bool(bool),
    /// Cached error literal such as `#N/A`
    Error(String),
    /// Plain formula, stored with its leading `=`
    Formula(String),
    /// Array (CSE) formula: text with leading `=` plus the range it spans
    ArrayFormula { text: String, range: String },
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Build a plain formula, adding the leading `=` when missing
    pub fn formula(text: impl Into<String>) -> Self {
        CellValue::Formula(with_equals(text.into()))
    }

    /// Build an array formula, adding the leading `=` when missing
    pub fn array_formula(text: impl Into<String>, range: impl Into<String>) -> Self {
        CellValue::ArrayFormula {
            text: with_equals(text.into()),
            range: range.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn is_array_formula(&self) -> bool {
        matches!(self, CellValue::ArrayFormula { .. })
    }

    /// String payload of string-typed values (text and plain formulas).
    ///
    /// Array formulas are not strings: their text travels with an array flag.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) | CellValue::Formula(s) => Some(s),
            _ => None,
        }
    }
}

fn with_equals(text: String) -> String {
    if text.starts_with('=') {
        text
    } else {
        format!("={}", text)
    }
}

/// A (value, number-format) pair.
///
/// Cells loaded from a package also remember the index of their style record
/// so that writing a new value or format keeps the rest of the template's look.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub number_format: String,
    style: Option<u32>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            value: CellValue::Empty,
            number_format: GENERAL.to_string(),
            style: None,
        }
    }
}

impl Cell {
    pub fn new(value: CellValue, number_format: impl Into<String>) -> Self {
        Self {
            value,
            number_format: number_format.into(),
            style: None,
        }
    }

    pub fn with_value(value: CellValue) -> Self {
        Self::new(value, GENERAL)
    }

    pub(crate) fn with_style(mut self, style: Option<u32>) -> Self {
        self.style = style;
        self
    }

    /// Style record index in the package this cell was loaded from
    pub fn style_id(&self) -> Option<u32> {
        self.style
    }

    /// A cell with no value, default format and no template styling carries nothing
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.number_format == GENERAL && self.style.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_constructors_add_equals() {
        assert_eq!(CellValue::formula("SUM(A1:A3)"), CellValue::Formula("=SUM(A1:A3)".into()));
        assert_eq!(CellValue::formula("=A1"), CellValue::Formula("=A1".into()));
        assert_eq!(
            CellValue::array_formula("EndDayOfCurrentMonth", "B4"),
            CellValue::ArrayFormula {
                text: "=EndDayOfCurrentMonth".into(),
                range: "B4".into()
            }
        );
    }

    #[test]
    fn test_as_str_excludes_array_formulas() {
        assert_eq!(CellValue::text("abc").as_str(), Some("abc"));
        assert_eq!(CellValue::formula("A1").as_str(), Some("=A1"));
        assert_eq!(CellValue::array_formula("A1", "A1").as_str(), None);
        assert_eq!(CellValue::Number(1.0).as_str(), None);
    }

    #[test]
    fn test_blank_cell() {
        assert!(Cell::default().is_blank());
        assert!(!Cell::new(CellValue::Empty, "0.00").is_blank());
        assert!(!Cell::default().with_style(Some(3)).is_blank());
    }
}

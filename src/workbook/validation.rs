//! Sheet-level data validation rules

use super::address::normalize_sqref;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationKind {
    #[default]
    Any,
    Whole,
    Decimal,
    List,
    Date,
    Time,
    TextLength,
    Custom,
}

impl ValidationKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "whole" => ValidationKind::Whole,
            "decimal" => ValidationKind::Decimal,
            "list" => ValidationKind::List,
            "date" => ValidationKind::Date,
            "time" => ValidationKind::Time,
            "textLength" => ValidationKind::TextLength,
            "custom" => ValidationKind::Custom,
            _ => ValidationKind::Any,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::Any => "none",
            ValidationKind::Whole => "whole",
            ValidationKind::Decimal => "decimal",
            ValidationKind::List => "list",
            ValidationKind::Date => "date",
            ValidationKind::Time => "time",
            ValidationKind::TextLength => "textLength",
            ValidationKind::Custom => "custom",
        }
    }
}

/// One `<dataValidation>` rule.
///
/// `hide_dropdown` mirrors OOXML `showDropDown`, whose `1` HIDES the arrow.
/// Formulas are stored without a leading `=`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValidation {
    pub kind: ValidationKind,
    pub sqref: String,
    pub formula1: Option<String>,
    pub formula2: Option<String>,
    pub operator: Option<String>,
    pub allow_blank: bool,
    pub hide_dropdown: bool,
    pub show_input_message: bool,
    pub show_error_message: bool,
    pub error_style: Option<String>,
    pub error_title: Option<String>,
    pub error: Option<String>,
    pub prompt_title: Option<String>,
    pub prompt: Option<String>,
}

impl DataValidation {
    /// Dropdown list drawing its entries from `source`, e.g. `'Data Validation'!$A$2:$A$99`
    pub fn list(target: &str, source: &str) -> Self {
        let source = source.trim();
        Self {
            kind: ValidationKind::List,
            sqref: normalize_sqref(target),
            formula1: Some(source.strip_prefix('=').unwrap_or(source).to_string()),
            allow_blank: true,
            hide_dropdown: false,
            show_error_message: true,
            ..Default::default()
        }
    }

    pub fn with_error_message(mut self, title: Option<String>, message: Option<String>) -> Self {
        self.error_title = title;
        self.error = message;
        self
    }
}

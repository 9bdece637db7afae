//! Final pass removing stray array braces from string formulas

use crate::workbook::{CellValue, Workbook};

/// `value` without `{`/`}`, when it is a string that starts with `=` and contains `{`
pub fn strip_braces(value: &CellValue) -> Option<CellValue> {
    let text = value.as_str()?;
    if !text.starts_with('=') || !text.contains('{') {
        return None;
    }
    let stripped: String = text.chars().filter(|c| !matches!(c, '{' | '}')).collect();
    Some(match value {
        CellValue::Formula(_) => CellValue::Formula(stripped),
        _ => CellValue::Text(stripped),
    })
}

/// Strip braces across every cell of every sheet. Returns the number of cells changed.
pub fn strip_legacy_braces(workbook: &mut Workbook) -> usize {
    let mut cleaned = 0;
    for sheet in workbook.sheets_mut() {
        for (_, cell) in sheet.cells_mut() {
            if let Some(stripped) = strip_braces(&cell.value) {
                cell.value = stripped;
                cleaned += 1;
            }
        }
    }
    cleaned
}

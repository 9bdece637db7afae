//! Cell-by-cell region copy with legacy formula substitution

use tracing::debug;

use super::plan::{BlankCellPolicy, FormulaRewrite, RegionSpec};
use crate::workbook::{CellValue, Sheet, GENERAL};

/// What one region copy did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub cells_written: usize,
    pub substitutions: usize,
}

/// Replacement for a deprecated array formula, if `value` is one.
///
/// Matching is on the exact formula text; the replacement is a plain formula,
/// so the array flag is dropped with the old token.
pub fn rewrite_legacy_formula(value: &CellValue, rewrites: &[FormulaRewrite]) -> Option<CellValue> {
    let CellValue::ArrayFormula { text, .. } = value else {
        return None;
    };
    rewrites
        .iter()
        .find(|rewrite| rewrite.legacy == *text)
        .map(|rewrite| CellValue::formula(rewrite.modern.clone()))
}

/// Copy every cell of `region` from `source` into the same coordinates of `target`.
///
/// Values and number formats are copied; the template's cell styling at each
/// position is kept. Cells outside the region are never touched.
pub fn copy_range(
    source: &Sheet,
    target: &mut Sheet,
    region: &RegionSpec,
    rewrites: &[FormulaRewrite],
    blanks: BlankCellPolicy,
) -> CopyStats {
    let mut stats = CopyStats::default();

    for row in region.rows() {
        for col in region.cols() {
            let (value, number_format) = match source.cell(row, col) {
                Some(cell) => (cell.value.clone(), cell.number_format.as_str()),
                None => (CellValue::Empty, GENERAL),
            };
            if value.is_empty() && blanks == BlankCellPolicy::Skip {
                continue;
            }

            let value = match rewrite_legacy_formula(&value, rewrites) {
                Some(modern) => {
                    stats.substitutions += 1;
                    modern
                }
                None => value,
            };
            target.write_cell(row, col, value, number_format);
            stats.cells_written += 1;
        }
    }

    debug!(
        sheet = %region.sheet,
        cells = stats.cells_written,
        substitutions = stats.substitutions,
        "Region copied"
    );
    stats
}

//! Re-attach list dropdowns that a plain cell copy leaves behind

use super::plan::ValidationSpec;
use crate::error::{MigrateError, MigrateResult};
use crate::workbook::{CellRange, DataValidation, Sheet};

/// Attach a list validation on `target` (e.g. `$B$4:$B$99`) drawing its entries
/// from `source` (e.g. `'Data Validation'!$A$2:$A$99`).
///
/// Blanks are allowed, the dropdown arrow is shown, and invalid entries raise
/// the error message. A rule already covering the same cells is replaced.
pub fn apply_list_validation(sheet: &mut Sheet, target: &str, source: &str) -> MigrateResult<()> {
    apply(sheet, DataValidation::list(target, source))
}

/// [`apply_list_validation`] for one catalog entry, with its optional error text
pub fn apply_validation_spec(sheet: &mut Sheet, spec: &ValidationSpec) -> MigrateResult<()> {
    let rule = DataValidation::list(&spec.target, &spec.source)
        .with_error_message(spec.error_title.clone(), spec.error_message.clone());
    apply(sheet, rule)
}

fn apply(sheet: &mut Sheet, rule: DataValidation) -> MigrateResult<()> {
    if rule.sqref.is_empty() || rule.sqref.split(' ').any(|r| CellRange::parse(r).is_none()) {
        return Err(MigrateError::Configuration(format!(
            "validation target '{}' on '{}' is not a cell range",
            rule.sqref,
            sheet.name()
        )));
    }
    if rule.formula1.as_deref().map_or(true, str::is_empty) {
        return Err(MigrateError::Configuration(format!(
            "validation on '{}'!{} has no source list",
            sheet.name(),
            rule.sqref
        )));
    }
    sheet.add_data_validation(rule);
    Ok(())
}

//! Exact-name sheet lookup

use crate::error::{MigrateError, MigrateResult};
use crate::workbook::{Sheet, Workbook};

/// The sheet named exactly `name`; no case folding, no trimming
pub fn find_sheet<'a>(workbook: &'a Workbook, name: &str) -> MigrateResult<&'a Sheet> {
    workbook
        .sheet(name)
        .ok_or_else(|| MigrateError::not_found(workbook.label(), name))
}

pub fn find_sheet_mut<'a>(workbook: &'a mut Workbook, name: &str) -> MigrateResult<&'a mut Sheet> {
    let label = workbook.label().to_string();
    workbook
        .sheet_mut(name)
        .ok_or_else(|| MigrateError::not_found(label, name))
}

/// Tab index of `name`
pub fn sheet_position(workbook: &Workbook, name: &str) -> MigrateResult<usize> {
    workbook
        .position(name)
        .ok_or_else(|| MigrateError::not_found(workbook.label(), name))
}

//! Relocation of the variable run of sheets between two anchor tabs.
//!
//! The source workbook keeps user-created sheets between `AD HOC→` and
//! `FOOTNOTES→`. Their names and count are unknown up front, so they are
//! discovered by position and rebuilt in the destination right after its own
//! start anchor, in the same order.

use std::collections::HashSet;

use tracing::{info, warn};

use super::locator::{find_sheet, sheet_position};
use super::plan::{AnchorPair, SheetCollisionPolicy};
use crate::error::{MigrateError, MigrateResult};
use crate::workbook::{Cell, Sheet, Workbook};

/// Longest sheet name Excel accepts
pub const MAX_SHEET_NAME: usize = 31;

/// Where one ad hoc sheet lands in the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdHocMove {
    pub source_name: String,
    pub target_name: String,
    /// Destination sheet removed to make room (replace policy)
    pub replaces: Option<String>,
}

/// The sheets strictly between the anchors, in tab order.
///
/// Both anchors must exist in `workbook`, start before end.
pub fn sheets_between<'a>(workbook: &'a Workbook, anchors: &AnchorPair) -> MigrateResult<&'a [Sheet]> {
    let start = workbook.position(&anchors.start).ok_or_else(|| {
        MigrateError::Configuration(format!(
            "Start anchor '{}' not found in {}",
            anchors.start,
            workbook.label()
        ))
    })?;
    let end = workbook.position(&anchors.end).ok_or_else(|| {
        MigrateError::Configuration(format!(
            "End anchor '{}' not found in {}",
            anchors.end,
            workbook.label()
        ))
    })?;
    if end <= start {
        return Err(MigrateError::Configuration(format!(
            "End anchor '{}' comes before start anchor '{}' in {}",
            anchors.end,
            anchors.start,
            workbook.label()
        )));
    }
    Ok(&workbook.sheets()[start + 1..end])
}

/// Work out every placement without touching `dest`
pub fn plan_ad_hoc_moves(
    source: &Workbook,
    dest: &Workbook,
    anchors: &AnchorPair,
    collisions: SheetCollisionPolicy,
) -> MigrateResult<Vec<AdHocMove>> {
    let sheets = sheets_between(source, anchors)?;
    sheet_position(dest, &anchors.start)?;

    // Excel compares sheet names case-insensitively
    let mut taken: HashSet<String> = dest.sheet_names().iter().map(|n| n.to_lowercase()).collect();
    let mut moves = Vec::with_capacity(sheets.len());

    for sheet in sheets {
        let name = sheet.name();
        let existing = dest
            .sheet_names()
            .into_iter()
            .find(|n| n.to_lowercase() == name.to_lowercase())
            .map(str::to_string);
        let collides = taken.contains(&name.to_lowercase());

        let placement = match (collides, collisions) {
            (false, _) => AdHocMove {
                source_name: name.to_string(),
                target_name: name.to_string(),
                replaces: None,
            },
            (true, SheetCollisionPolicy::Rename) => AdHocMove {
                source_name: name.to_string(),
                target_name: unique_name(name, &taken),
                replaces: None,
            },
            (true, SheetCollisionPolicy::Reject) => {
                return Err(MigrateError::Configuration(format!(
                    "ad hoc sheet '{}' already exists in {}",
                    name,
                    dest.label()
                )));
            }
            (true, SheetCollisionPolicy::Replace) => {
                if existing.as_deref() == Some(anchors.start.as_str()) {
                    return Err(MigrateError::Configuration(format!(
                        "ad hoc sheet '{}' would replace the start anchor",
                        name
                    )));
                }
                AdHocMove {
                    source_name: name.to_string(),
                    target_name: name.to_string(),
                    replaces: existing,
                }
            }
        };

        taken.insert(placement.target_name.to_lowercase());
        moves.push(placement);
    }

    Ok(moves)
}

/// Rebuild each planned sheet in `dest`, right after the start anchor, in order.
/// Returns the names as placed.
pub fn apply_ad_hoc_moves(
    source: &Workbook,
    dest: &mut Workbook,
    anchors: &AnchorPair,
    moves: &[AdHocMove],
) -> MigrateResult<Vec<String>> {
    for placement in moves {
        if let Some(replaced) = &placement.replaces {
            info!(sheet = %replaced, "Replacing template sheet");
            dest.remove_sheet(replaced);
        }
    }

    let mut after = anchors.start.clone();
    let mut placed = Vec::with_capacity(moves.len());
    for placement in moves {
        let original = find_sheet(source, &placement.source_name)?;
        if !original.is_worksheet() {
            warn!(sheet = %original.name(), "Ad hoc tab is not a worksheet; placing an empty sheet");
        }
        let copy = copy_sheet(original, &placement.target_name);
        info!(
            sheet = %placement.target_name,
            cells = copy.cell_count(),
            after = %after,
            "Placing ad hoc sheet"
        );
        dest.insert_sheet_after(&after, copy)?;
        after = placement.target_name.clone();
        placed.push(placement.target_name.clone());
    }

    Ok(placed)
}

/// Move the sheets between `anchors` in `source` to just after the start anchor in `dest`
pub fn migrate_ad_hoc_sheets(
    source: &Workbook,
    dest: &mut Workbook,
    anchors: &AnchorPair,
    collisions: SheetCollisionPolicy,
) -> MigrateResult<Vec<String>> {
    let moves = plan_ad_hoc_moves(source, dest, anchors, collisions)?;
    apply_ad_hoc_moves(source, dest, anchors, &moves)
}

/// Every populated cell's value and number format, at the same coordinates, no substitution
fn copy_sheet(original: &Sheet, name: &str) -> Sheet {
    let mut copy = Sheet::new(name);
    for (at, cell) in original.populated_cells() {
        copy.set_cell(
            at.row,
            at.col,
            Cell::new(cell.value.clone(), cell.number_format.clone()),
        );
    }
    copy
}

fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    (2..)
        .map(|n| {
            let suffix = format!(" ({})", n);
            let room = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
            let base: String = name.chars().take(room).collect();
            format!("{}{}", base.trim_end(), suffix)
        })
        .find(|candidate| !taken.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| name.to_string())
}

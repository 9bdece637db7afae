//! Migration catalog: which regions to copy, which dropdowns to re-attach,
//! where the ad hoc sheets live, and the policies for the awkward cases.

use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, MigrateResult};
use crate::workbook::address::{normalize_sqref, MAX_COL, MAX_ROW};
use crate::workbook::CellRange;

pub const AD_HOC_START: &str = "AD HOC→";
pub const AD_HOC_END: &str = "FOOTNOTES→";
pub const LEGACY_END_OF_MONTH: &str = "=EndDayOfCurrentMonth";
pub const MODERN_END_OF_MONTH: &str = "=EndOfCurrentMonth";

/// A fixed, inclusive box of cells on a named sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub sheet: String,
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl RegionSpec {
    pub fn new(sheet: impl Into<String>, rows: RangeInclusive<u32>, cols: RangeInclusive<u32>) -> Self {
        Self {
            sheet: sheet.into(),
            start_row: *rows.start(),
            end_row: *rows.end(),
            start_col: *cols.start(),
            end_col: *cols.end(),
        }
    }

    pub fn rows(&self) -> RangeInclusive<u32> {
        self.start_row..=self.end_row
    }

    pub fn cols(&self) -> RangeInclusive<u32> {
        self.start_col..=self.end_col
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        self.rows().contains(&row) && self.cols().contains(&col)
    }
}

/// A list dropdown on `target` fed by `source`, e.g. `'Data Validation'!$A$2:$A$99`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSpec {
    pub sheet: String,
    pub target: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ValidationSpec {
    pub fn new(sheet: impl Into<String>, target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            target: target.into(),
            source: source.into(),
            error_title: None,
            error_message: None,
        }
    }
}

/// Sheet names bracketing the variable run of ad hoc sheets (both exclusive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorPair {
    pub start: String,
    pub end: String,
}

impl Default for AnchorPair {
    fn default() -> Self {
        Self {
            start: AD_HOC_START.to_string(),
            end: AD_HOC_END.to_string(),
        }
    }
}

/// Array formula text that is replaced, verbatim, by a plain formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaRewrite {
    pub legacy: String,
    pub modern: String,
}

impl FormulaRewrite {
    pub fn new(legacy: impl Into<String>, modern: impl Into<String>) -> Self {
        Self {
            legacy: legacy.into(),
            modern: modern.into(),
        }
    }
}

/// What an empty source cell does to the destination cell under it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankCellPolicy {
    /// Blank the destination cell (the template's value is cleared)
    #[default]
    Overwrite,
    /// Leave the template's cell alone
    Skip,
}

/// What happens when an ad hoc sheet's name is already taken in the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetCollisionPolicy {
    /// Place it as `Name (2)`, `Name (3)`, …
    #[default]
    Rename,
    /// Abort the migration
    Reject,
    /// Drop the template's sheet and place the migrated one
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationPlan {
    pub regions: Vec<RegionSpec>,
    pub validations: Vec<ValidationSpec>,
    pub anchors: Option<AnchorPair>,
    pub formula_rewrites: Vec<FormulaRewrite>,
    pub blank_cells: BlankCellPolicy,
    pub sheet_collisions: SheetCollisionPolicy,
    /// Refuse templates that carry no VBA project
    pub require_macros: bool,
}

impl Default for MigrationPlan {
    fn default() -> Self {
        const DV: &str = "'Data Validation'";
        let list = |sheet: &str, target: &str, col: char| {
            ValidationSpec::new(sheet, target, format!("{}!${}$2:${}$99", DV, col, col))
        };

        Self {
            regions: vec![
                RegionSpec::new("Assets", 3..=99, 2..=5),
                RegionSpec::new("Credit Cards", 3..=24, 2..=6),
                RegionSpec::new("Loans", 3..=99, 2..=3),
                RegionSpec::new("Loyalty Points & Miles", 3..=53, 2..=6),
                RegionSpec::new("Recurring", 3..=53, 2..=7),
                RegionSpec::new("Precedents", 3..=99, 2..=5),
                RegionSpec::new("Changes", 3..=23, 2..=7),
                RegionSpec::new("Planned", 3..=24, 2..=6),
            ],
            validations: vec![
                list("Assets", "$B$4:$B$99", 'A'),
                list("Recurring", "$B$4:$B$99", 'B'),
                list("Recurring", "$E$4:$E$99", 'C'),
                list("Precedents", "$B$4:$B$99", 'B'),
                list("Precedents", "$D$4:$D$99", 'B'),
                list("Changes", "$B$4:$B$99", 'B'),
                list("Changes", "$E$4:$E$99", 'C'),
                list("Planned", "$B$4:$B$99", 'B'),
                list("Planned", "$D$4:$D$99", 'D'),
            ],
            anchors: Some(AnchorPair::default()),
            formula_rewrites: vec![FormulaRewrite::new(LEGACY_END_OF_MONTH, MODERN_END_OF_MONTH)],
            blank_cells: BlankCellPolicy::default(),
            sheet_collisions: SheetCollisionPolicy::default(),
            require_macros: false,
        }
    }
}

impl MigrationPlan {
    /// Parse and validate a YAML plan. Omitted keys take the built-in values.
    pub fn from_yaml_str(yaml: &str) -> MigrateResult<Self> {
        let plan: MigrationPlan = serde_yaml::from_str(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_file(path: &Path) -> MigrateResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn to_yaml(&self) -> MigrateResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject catalogs that cannot describe a migration
    pub fn validate(&self) -> MigrateResult<()> {
        for region in &self.regions {
            if region.sheet.is_empty() {
                return Err(config("region with an empty sheet name"));
            }
            if region.start_row == 0 || region.start_col == 0 {
                return Err(config(format!(
                    "region on '{}' is 1-indexed; row and column 0 do not exist",
                    region.sheet
                )));
            }
            if region.start_row > region.end_row || region.start_col > region.end_col {
                return Err(config(format!(
                    "region on '{}' is inverted (rows {}-{}, cols {}-{})",
                    region.sheet, region.start_row, region.end_row, region.start_col, region.end_col
                )));
            }
            if region.end_row > MAX_ROW || region.end_col > MAX_COL {
                return Err(config(format!("region on '{}' runs off the grid", region.sheet)));
            }
        }

        for validation in &self.validations {
            if validation.sheet.is_empty() {
                return Err(config("validation with an empty sheet name"));
            }
            let sqref = normalize_sqref(&validation.target);
            if sqref.is_empty() || sqref.split(' ').any(|part| CellRange::parse(part).is_none()) {
                return Err(config(format!(
                    "validation target '{}' on '{}' is not a cell range",
                    validation.target, validation.sheet
                )));
            }
            if validation.source.trim().is_empty() {
                return Err(config(format!(
                    "validation on '{}'!{} has no source list",
                    validation.sheet, validation.target
                )));
            }
        }

        if let Some(anchors) = &self.anchors {
            if anchors.start.is_empty() || anchors.end.is_empty() {
                return Err(config("ad hoc anchors must both be named"));
            }
            if anchors.start == anchors.end {
                return Err(config(format!(
                    "ad hoc anchors are the same sheet '{}'",
                    anchors.start
                )));
            }
        }

        for (i, rewrite) in self.formula_rewrites.iter().enumerate() {
            if !rewrite.legacy.starts_with('=') || !rewrite.modern.starts_with('=') {
                return Err(config(format!(
                    "formula rewrite '{}' -> '{}' must use formulas starting with '='",
                    rewrite.legacy, rewrite.modern
                )));
            }
            if self.formula_rewrites[..i].iter().any(|r| r.legacy == rewrite.legacy) {
                return Err(config(format!("formula '{}' is rewritten twice", rewrite.legacy)));
            }
        }

        Ok(())
    }
}

fn config(message: impl Into<String>) -> MigrateError {
    MigrateError::Configuration(message.into())
}

//! The migration pipeline.
//!
//! Load → fixed region copies → dropdown re-validation → ad hoc sheet move →
//! brace cleanup → serialize. Every step runs on the destination's in-memory
//! copy; any error aborts the run and no bytes are produced.

use serde::Serialize;
use tracing::{debug, info};

use super::ad_hoc::{apply_ad_hoc_moves, plan_ad_hoc_moves};
use super::cleanup::strip_legacy_braces;
use super::copier::copy_range;
use super::locator::{find_sheet, find_sheet_mut};
use super::plan::MigrationPlan;
use super::validation::apply_validation_spec;
use crate::error::{MigrateError, MigrateResult};
use crate::workbook::Workbook;
use crate::xlsx::{read_workbook, write_workbook};

pub const SOURCE_LABEL: &str = "source workbook";
pub const TEMPLATE_LABEL: &str = "template workbook";

/// Receives coarse progress checkpoints (0-100) at phase boundaries
pub trait ProgressSink {
    fn report(&self, percent: u8, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str),
{
    fn report(&self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// What a migration did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub cells_copied: usize,
    pub substitutions: usize,
    pub validations_applied: usize,
    /// Ad hoc sheet names as placed in the destination, in tab order
    pub ad_hoc_sheets: Vec<String>,
    pub braces_cleaned: usize,
}

pub struct Migrator {
    plan: MigrationPlan,
}

impl Migrator {
    pub fn new(plan: MigrationPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    /// Migrate `source` into a copy of `template` and return the new workbook's bytes
    pub fn migrate_bytes(
        &self,
        source: &[u8],
        template: &[u8],
        progress: &dyn ProgressSink,
    ) -> MigrateResult<Vec<u8>> {
        self.migrate_bytes_with_report(source, template, progress)
            .map(|(bytes, _)| bytes)
    }

    pub fn migrate_bytes_with_report(
        &self,
        source: &[u8],
        template: &[u8],
        progress: &dyn ProgressSink,
    ) -> MigrateResult<(Vec<u8>, MigrationReport)> {
        self.plan.validate()?;

        progress.report(0, "Loading workbooks");
        let source = read_workbook(source, SOURCE_LABEL)?;
        let mut dest = read_workbook(template, TEMPLATE_LABEL)?;
        if self.plan.require_macros && !dest.has_vba_project() {
            return Err(MigrateError::input_format(
                TEMPLATE_LABEL,
                "template has no VBA project (xl/vbaProject.bin)",
            ));
        }
        progress.report(10, "Workbooks loaded");

        let report = self.migrate(&source, &mut dest, progress)?;

        let bytes = write_workbook(&dest)?;
        info!(bytes = bytes.len(), "Migrated workbook written");
        progress.report(100, "Migration complete");
        Ok((bytes, report))
    }

    /// Run the pipeline on loaded workbooks, mutating `dest`.
    ///
    /// Every sheet the plan names is located before the first write, so a
    /// missing sheet leaves `dest` untouched.
    pub fn migrate(
        &self,
        source: &Workbook,
        dest: &mut Workbook,
        progress: &dyn ProgressSink,
    ) -> MigrateResult<MigrationReport> {
        let plan = &self.plan;
        self.preflight(source, dest)?;
        let ad_hoc_moves = match &plan.anchors {
            Some(anchors) => plan_ad_hoc_moves(source, dest, anchors, plan.sheet_collisions)?,
            None => Vec::new(),
        };

        let mut report = MigrationReport::default();

        let regions = plan.regions.len().max(1);
        for (i, region) in plan.regions.iter().enumerate() {
            let from = find_sheet(source, &region.sheet)?;
            let to = find_sheet_mut(dest, &region.sheet)?;
            let stats = copy_range(from, to, region, &plan.formula_rewrites, plan.blank_cells);
            report.cells_copied += stats.cells_written;
            report.substitutions += stats.substitutions;

            let percent = 10 + (50 * (i + 1) / regions) as u8;
            progress.report(percent, &format!("Copied {}", region.sheet));
        }
        info!(
            regions = plan.regions.len(),
            cells = report.cells_copied,
            substitutions = report.substitutions,
            "Fixed regions copied"
        );

        for spec in &plan.validations {
            let sheet = find_sheet_mut(dest, &spec.sheet)?;
            apply_validation_spec(sheet, spec)?;
            report.validations_applied += 1;
            debug!(sheet = %spec.sheet, target = %spec.target, "Validation re-applied");
        }
        progress.report(70, "Data validation re-applied");

        if let Some(anchors) = &plan.anchors {
            report.ad_hoc_sheets = apply_ad_hoc_moves(source, dest, anchors, &ad_hoc_moves)?;
        }
        info!(sheets = ?report.ad_hoc_sheets, "Ad hoc sheets migrated");
        progress.report(80, "Ad hoc sheets migrated");

        report.braces_cleaned = strip_legacy_braces(dest);
        debug!(cells = report.braces_cleaned, "Legacy braces stripped");
        progress.report(90, "Formulas cleaned");

        Ok(report)
    }

    fn preflight(&self, source: &Workbook, dest: &Workbook) -> MigrateResult<()> {
        for region in &self.plan.regions {
            find_sheet(source, &region.sheet)?;
            find_sheet(dest, &region.sheet)?;
        }
        for spec in &self.plan.validations {
            find_sheet(dest, &spec.sheet)?;
        }
        Ok(())
    }
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(MigrationPlan::default())
    }
}

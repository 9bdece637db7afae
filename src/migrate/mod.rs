//! The migration engine
//!
//! Each step is a free function over the workbook model so it can be exercised
//! on its own; [`Migrator`] strings them together in the fixed order and
//! reports progress.

pub mod ad_hoc;
pub mod cleanup;
pub mod copier;
pub mod locator;
pub mod orchestrator;
pub mod plan;
pub mod validation;

pub use ad_hoc::{migrate_ad_hoc_sheets, sheets_between, AdHocMove};
pub use cleanup::{strip_braces, strip_legacy_braces};
pub use copier::{copy_range, rewrite_legacy_formula, CopyStats};
pub use locator::{find_sheet, find_sheet_mut};
pub use orchestrator::{MigrationReport, Migrator, NoProgress, ProgressSink, SOURCE_LABEL, TEMPLATE_LABEL};
pub use plan::{
    AnchorPair, BlankCellPolicy, FormulaRewrite, MigrationPlan, RegionSpec, SheetCollisionPolicy,
    ValidationSpec,
};
pub use validation::{apply_list_validation, apply_validation_spec};

//! Sheet Migrate - carry user data from an old workbook layout into the
//! current macro-enabled template
//!
//! The engine takes two workbook byte streams (the user's old workbook and the
//! template) and produces one: the template with the old workbook's data in it.
//!
//! # Steps
//!
//! - Fixed regions are copied cell by cell (values and number formats), with
//!   the legacy `{=EndDayOfCurrentMonth}` array formula rewritten
//! - List validations are re-applied on the template
//! - The sheets between `AD HOC→` and `FOOTNOTES→` move across in order
//! - Leftover `{=...}` braces are stripped from formula text
//!
//! # Example
//!
//! ```no_run
//! use sheet_migrate::{Migrator, MigrationPlan};
//! use sheet_migrate::migrate::NoProgress;
//!
//! let source = std::fs::read("old.xlsx")?;
//! let template = std::fs::read("template.xlsm")?;
//!
//! let migrator = Migrator::new(MigrationPlan::default());
//! let migrated = migrator.migrate_bytes(&source, &template, &NoProgress)?;
//! std::fs::write("updated_template.xlsm", migrated)?;
//! # Ok::<(), sheet_migrate::MigrateError>(())
//! ```

pub mod api;
pub mod cli;
pub mod error;
pub mod migrate;
pub mod progress;
pub mod workbook;
pub mod xlsx;

// Re-export commonly used types
pub use error::{MigrateError, MigrateResult};
pub use migrate::{MigrationPlan, MigrationReport, Migrator, ProgressSink};
pub use workbook::{Cell, CellValue, Sheet, Workbook};
pub use xlsx::{read_workbook, write_workbook};

//! `.xlsx` / `.xlsm` package I/O
//!
//! Reading keeps the whole zip package alongside the model. Writing patches the
//! template's own package: sheet data, validations, the sheet list and number
//! formats are regenerated while everything else (the VBA project included)
//! passes through byte-for-byte.

mod formula_refs;
mod layout;
mod package;
mod reader;
mod relationships;
mod styles;
mod writer;
mod xml;

pub use layout::SheetLayout;
pub use package::{Package, VBA_PROJECT_PART};
pub use reader::read_workbook;
pub use writer::write_workbook;

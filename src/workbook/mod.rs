//! In-memory workbook model
//!
//! A [`Workbook`] is an ordered list of uniquely named [`Sheet`]s. Each sheet is
//! a sparse grid of [`Cell`]s addressed 1-indexed by (row, column), plus the
//! sheet-level [`DataValidation`] rules that plain cell copies do not carry.

pub mod address;
mod book;
mod cell;
mod sheet;
mod validation;

pub use address::{column_index, column_letters, CellRange, CellRef};
pub use book::Workbook;
pub use cell::{Cell, CellValue, GENERAL};
pub use sheet::Sheet;
pub use validation::{DataValidation, ValidationKind};

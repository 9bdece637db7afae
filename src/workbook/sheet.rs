use std::collections::BTreeMap;

use super::address::{CellRange, CellRef};
use super::cell::{Cell, CellValue, GENERAL};
use super::validation::DataValidation;
use crate::xlsx::SheetLayout;

static EMPTY: CellValue = CellValue::Empty;

/// One named tab: a sparse grid of cells plus its data validations
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<CellRef, Cell>,
    data_validations: Vec<DataValidation>,
    pub(crate) layout: Option<SheetLayout>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
            data_validations: Vec::new(),
            layout: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chartsheets, dialog sheets and macro sheets keep their tab position but hold no cells
    pub fn is_worksheet(&self) -> bool {
        self.layout.as_ref().map_or(true, |layout| !layout.is_opaque())
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&CellRef::new(row, col))
    }

    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        self.cell(row, col).map_or(&EMPTY, |c| &c.value)
    }

    pub fn number_format(&self, row: u32, col: u32) -> &str {
        self.cell(row, col).map_or(GENERAL, |c| c.number_format.as_str())
    }

    /// Replace a cell wholesale, dropping any template styling at that position
    pub fn set_cell(&mut self, row: u32, col: u32, cell: Cell) {
        self.cells.insert(CellRef::new(row, col), cell);
    }

    /// Set the value, keeping the cell's format and template styling
    pub fn set_value(&mut self, row: u32, col: u32, value: CellValue) {
        self.cells.entry(CellRef::new(row, col)).or_default().value = value;
    }

    /// Overwrite value and number format, keeping the template styling
    pub fn write_cell(&mut self, row: u32, col: u32, value: CellValue, number_format: &str) {
        let cell = self.cells.entry(CellRef::new(row, col)).or_default();
        cell.value = value;
        if cell.number_format != number_format {
            cell.number_format = number_format.to_string();
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(at, cell)| (*at, cell))
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = (CellRef, &mut Cell)> {
        self.cells.iter_mut().map(|(at, cell)| (*at, cell))
    }

    /// Cells holding a value or a non-default format
    pub fn populated_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells()
            .filter(|(_, cell)| !cell.value.is_empty() || cell.number_format != GENERAL)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Bounding box of the populated cells
    pub fn used_range(&self) -> Option<CellRange> {
        let mut cells = self.populated_cells().map(|(at, _)| at);
        let first = cells.next()?;
        let (mut min, mut max) = (first, first);
        for at in cells {
            min = CellRef::new(min.row.min(at.row), min.col.min(at.col));
            max = CellRef::new(max.row.max(at.row), max.col.max(at.col));
        }
        Some(CellRange::new(min, max))
    }

    pub fn data_validations(&self) -> &[DataValidation] {
        &self.data_validations
    }

    /// Attach a rule; a rule already covering exactly the same `sqref` is replaced
    pub fn add_data_validation(&mut self, validation: DataValidation) {
        match self
            .data_validations
            .iter_mut()
            .find(|existing| existing.sqref == validation.sqref)
        {
            Some(existing) => *existing = validation,
            None => self.data_validations.push(validation),
        }
    }

    pub(crate) fn push_loaded_validation(&mut self, validation: DataValidation) {
        self.data_validations.push(validation);
    }
}

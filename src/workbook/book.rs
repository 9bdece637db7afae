use super::sheet::Sheet;
use crate::error::{MigrateError, MigrateResult};
use crate::xlsx::Package;

/// An ordered set of uniquely named sheets.
///
/// Order is tab order. Sheets are addressed by name; positional changes go
/// through [`Workbook::insert_sheet_after`] and [`Workbook::remove_sheet`].
#[derive(Debug, Clone)]
pub struct Workbook {
    label: String,
    sheets: Vec<Sheet>,
    pub(crate) package: Option<Package>,
}

impl Workbook {
    /// `label` names the workbook in error messages ("source workbook", "template")
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sheets: Vec::new(),
            package: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheets_mut(&mut self) -> impl Iterator<Item = &mut Sheet> {
        self.sheets.iter_mut()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Tab index of the sheet whose name matches exactly
    pub fn position(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name() == name)
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    /// Append a sheet as the last tab
    pub fn add_sheet(&mut self, sheet: Sheet) -> MigrateResult<()> {
        self.ensure_unique(sheet.name())?;
        self.sheets.push(sheet);
        Ok(())
    }

    /// Insert `sheet` as the tab immediately after `anchor`
    pub fn insert_sheet_after(&mut self, anchor: &str, sheet: Sheet) -> MigrateResult<()> {
        let at = self
            .position(anchor)
            .ok_or_else(|| MigrateError::not_found(self.label.as_str(), anchor))?;
        self.ensure_unique(sheet.name())?;
        self.sheets.insert(at + 1, sheet);
        Ok(())
    }

    pub fn remove_sheet(&mut self, name: &str) -> Option<Sheet> {
        let at = self.position(name)?;
        Some(self.sheets.remove(at))
    }

    /// Macro project carried by the package this workbook was loaded from
    pub fn has_vba_project(&self) -> bool {
        self.package
            .as_ref()
            .is_some_and(|p| p.part(crate::xlsx::VBA_PROJECT_PART).is_some())
    }

    fn ensure_unique(&self, name: &str) -> MigrateResult<()> {
        if self.has_sheet(name) {
            return Err(MigrateError::Configuration(format!(
                "{} already has a sheet named '{}'",
                self.label, name
            )));
        }
        Ok(())
    }
}

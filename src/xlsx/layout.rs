use std::collections::BTreeMap;

/// Everything about a loaded worksheet part except its cells and validations.
///
/// The writer re-emits `prefix`, regenerated `<sheetData>`, then `suffix`, so
/// column widths, views, merges, conditional formats, drawings and the rest of
/// the template's sheet furniture are carried over untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub(crate) package_id: u64,
    pub(crate) part_name: String,
    pub(crate) rel_id: String,
    /// The sheet's original `<sheet …/>` element in `workbook.xml`
    pub(crate) entry_xml: String,
    pub(crate) prefix: String,
    pub(crate) suffix: String,
    /// Row attributes other than `r` and `spans` (height, hidden, style)
    pub(crate) row_attrs: BTreeMap<u32, Vec<(String, String)>>,
    pub(crate) opaque: bool,
}

impl SheetLayout {
    /// Non-worksheet parts (chartsheets, dialog and macro sheets) are carried as-is
    pub(crate) fn opaque(package_id: u64, part_name: String, rel_id: String, entry_xml: String) -> Self {
        Self {
            package_id,
            part_name,
            rel_id,
            entry_xml,
            prefix: String::new(),
            suffix: String::new(),
            row_attrs: BTreeMap::new(),
            opaque: true,
        }
    }

    pub(crate) fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub(crate) fn belongs_to(&self, package_id: u64) -> bool {
        self.package_id == package_id
    }
}

/// Worksheet furniture for sheets created in memory
pub(crate) const BLANK_PREFIX: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<dimension ref="A1"/>"#,
    r#"<sheetViews><sheetView workbookViewId="0"/></sheetViews>"#,
    r#"<sheetFormatPr defaultRowHeight="15"/>"#,
);

pub(crate) const BLANK_SUFFIX: &str = concat!(
    r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    r#"</worksheet>"#,
);

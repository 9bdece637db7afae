//! Number formats and cell style records (`xl/styles.xml`)
//!
//! Only `numFmts` and `cellXfs` are modelled. Every other style table is left
//! exactly as the template wrote it, and each `xf` keeps its raw XML so fonts,
//! fills, borders and alignment survive a format change.

use std::collections::{BTreeMap, HashMap};

use super::xml;
use crate::workbook::GENERAL;

/// First id Excel leaves free for workbook-defined formats
const FIRST_CUSTOM_FORMAT: u32 = 164;

const DEFAULT_XF: &str = r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#;

pub(crate) const MINIMAL_STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);

static BUILTIN_FORMATS: &[(u32, &str)] = &[
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (5, r##""$"#,##0_);("$"#,##0)"##),
    (6, r##""$"#,##0_);[Red]("$"#,##0)"##),
    (7, r##""$"#,##0.00_);("$"#,##0.00)"##),
    (8, r##""$"#,##0.00_);[Red]("$"#,##0.00)"##),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0_);(#,##0)"),
    (38, "#,##0_);[Red](#,##0)"),
    (39, "#,##0.00_);(#,##0.00)"),
    (40, "#,##0.00_);[Red](#,##0.00)"),
    (41, r##"_(* #,##0_);_(* \(#,##0\);_(* "-"_);_(@_)"##),
    (42, r##"_("$"* #,##0_);_("$"* \(#,##0\);_("$"* "-"_);_(@_)"##),
    (43, r##"_(* #,##0.00_);_(* \(#,##0.00\);_(* "-"??_);_(@_)"##),
    (44, r##"_("$"* #,##0.00_);_("$"* \(#,##0.00\);_("$"* "-"??_);_(@_)"##),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

fn builtin_code(id: u32) -> Option<&'static str> {
    BUILTIN_FORMATS
        .iter()
        .find(|(builtin, _)| *builtin == id)
        .map(|(_, code)| *code)
}

fn builtin_id(code: &str) -> Option<u32> {
    BUILTIN_FORMATS
        .iter()
        .find(|(_, builtin)| *builtin == code)
        .map(|(id, _)| *id)
}

#[derive(Debug, Clone, PartialEq)]
struct CellXf {
    num_fmt_id: u32,
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct StyleSheet {
    custom_formats: BTreeMap<u32, String>,
    xfs: Vec<CellXf>,
    derived: HashMap<(u32, u32), u32>,
    dirty: bool,
}

impl StyleSheet {
    pub(crate) fn parse(styles_xml: &str) -> Self {
        let mut sheet = StyleSheet::default();

        if let Some((start, end)) = xml::find_element(styles_xml, "numFmts", 0) {
            let block = &styles_xml[start..end];
            for (s, e) in xml::find_all(block, "numFmt") {
                let element = &block[s..e];
                let id = xml::attr(element, "numFmtId").and_then(|v| v.parse().ok());
                if let (Some(id), Some(code)) = (id, xml::attr(element, "formatCode")) {
                    sheet.custom_formats.insert(id, code);
                }
            }
        }

        if let Some((start, end)) = xml::find_element(styles_xml, "cellXfs", 0) {
            let block = &styles_xml[start..end];
            let inner_start = xml::start_tag_end(block, 0).unwrap_or(block.len());
            for (s, e) in xml::find_all(&block[inner_start..], "xf") {
                let raw = &block[inner_start + s..inner_start + e];
                sheet.xfs.push(CellXf {
                    num_fmt_id: xml::attr(raw, "numFmtId")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0),
                    raw: raw.to_string(),
                });
            }
        }

        sheet
    }

    /// Format code a cell with style index `xf` displays with
    pub(crate) fn format_code(&self, xf: u32) -> String {
        let id = self.xfs.get(xf as usize).map_or(0, |x| x.num_fmt_id);
        self.code_for_id(id)
    }

    fn code_for_id(&self, id: u32) -> String {
        self.custom_formats
            .get(&id)
            .cloned()
            .or_else(|| builtin_code(id).map(str::to_string))
            .unwrap_or_else(|| GENERAL.to_string())
    }

    /// Id for `code`, registering a custom format when the workbook has none matching
    fn format_id(&mut self, code: &str) -> u32 {
        if let Some(id) = builtin_id(code) {
            return id;
        }
        if let Some((id, _)) = self.custom_formats.iter().find(|(_, c)| c.as_str() == code) {
            return *id;
        }
        let id = self
            .custom_formats
            .keys()
            .next_back()
            .map_or(FIRST_CUSTOM_FORMAT, |last| (*last + 1).max(FIRST_CUSTOM_FORMAT));
        self.custom_formats.insert(id, code.to_string());
        self.dirty = true;
        id
    }

    /// Style index showing `code` that otherwise looks like `base`.
    ///
    /// `base` indices this style sheet does not know fall back to the default record.
    pub(crate) fn xf_for(&mut self, base: Option<u32>, code: &str) -> u32 {
        if self.xfs.is_empty() {
            self.xfs.push(CellXf {
                num_fmt_id: 0,
                raw: DEFAULT_XF.to_string(),
            });
            self.dirty = true;
        }
        let base = base
            .filter(|b| (*b as usize) < self.xfs.len())
            .unwrap_or(0);
        let fmt = self.format_id(code);
        if self.xfs[base as usize].num_fmt_id == fmt {
            return base;
        }
        if let Some(existing) = self.derived.get(&(base, fmt)) {
            return *existing;
        }

        let raw = xml::set_attr(&self.xfs[base as usize].raw, "numFmtId", &fmt.to_string());
        let raw = xml::set_attr(&raw, "applyNumberFormat", "1");
        self.xfs.push(CellXf { num_fmt_id: fmt, raw });
        let index = (self.xfs.len() - 1) as u32;
        self.derived.insert((base, fmt), index);
        self.dirty = true;
        index
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rewrite the `numFmts` and `cellXfs` tables of `styles_xml`
    pub(crate) fn apply(&self, styles_xml: &str) -> String {
        let mut out = styles_xml.to_string();

        if !self.custom_formats.is_empty() {
            let mut block = format!(r#"<numFmts count="{}">"#, self.custom_formats.len());
            for (id, code) in &self.custom_formats {
                block.push_str(&format!(
                    r#"<numFmt numFmtId="{}" formatCode="{}"/>"#,
                    id,
                    xml::escape(code)
                ));
            }
            block.push_str("</numFmts>");

            match xml::find_element(&out, "numFmts", 0) {
                Some((start, end)) => out.replace_range(start..end, &block),
                None => {
                    if let Some(at) = xml::find_element(&out, "styleSheet", 0)
                        .and_then(|(start, _)| xml::start_tag_end(&out, start))
                    {
                        out.insert_str(at, &block);
                    }
                }
            }
        }

        let mut block = format!(r#"<cellXfs count="{}">"#, self.xfs.len());
        for xf in &self.xfs {
            block.push_str(&xf.raw);
        }
        block.push_str("</cellXfs>");

        match xml::find_element(&out, "cellXfs", 0) {
            Some((start, end)) => out.replace_range(start..end, &block),
            None => {
                let at = ["<cellStyles", "<dxfs", "<tableStyles", "</styleSheet>"]
                    .iter()
                    .find_map(|marker| out.find(marker))
                    .unwrap_or(out.len());
                out.insert_str(at, &block);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="&quot;$&quot;#,##0.00"/></numFmts><fonts count="2"/><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="1" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="164" fontId="1" fillId="0" borderId="0" xfId="0"><alignment horizontal="right"/></xf></cellXfs><cellStyles count="1"/></styleSheet>"#;

    #[test]
    fn test_format_codes_resolve_builtin_and_custom() {
        let styles = StyleSheet::parse(STYLES);
        assert_eq!(styles.format_code(0), "General");
        assert_eq!(styles.format_code(1), "mm-dd-yy");
        assert_eq!(styles.format_code(2), "\"$\"#,##0.00");
        assert_eq!(styles.format_code(99), "General");
    }

    #[test]
    fn test_matching_format_reuses_base() {
        let mut styles = StyleSheet::parse(STYLES);
        assert_eq!(styles.xf_for(Some(1), "mm-dd-yy"), 1);
        assert_eq!(styles.xf_for(None, "General"), 0);
        assert!(!styles.is_dirty());
    }

    #[test]
    fn test_new_format_clones_base_once() {
        let mut styles = StyleSheet::parse(STYLES);
        let first = styles.xf_for(Some(2), "0.0%");
        let second = styles.xf_for(Some(2), "0.0%");
        assert_eq!(first, 3);
        assert_eq!(first, second);
        assert_eq!(styles.format_code(first), "0.0%");
        assert!(styles.is_dirty());

        let xml = styles.apply(STYLES);
        assert!(xml.contains(r#"<numFmt numFmtId="165" formatCode="0.0%"/>"#));
        assert!(xml.contains(r#"<cellXfs count="4">"#));
        assert!(xml.contains(r#"<xf numFmtId="165" fontId="1" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"><alignment horizontal="right"/></xf>"#));
        assert!(xml.contains(r#"<cellStyleXfs count="1">"#));
    }

    #[test]
    fn test_builtin_format_needs_no_custom_entry() {
        let mut styles = StyleSheet::parse(MINIMAL_STYLES);
        let xf = styles.xf_for(None, "0.00");
        assert_eq!(xf, 1);
        let xml = styles.apply(MINIMAL_STYLES);
        assert!(!xml.contains("<numFmts"));
        assert!(xml.contains(r#"<xf numFmtId="2" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#));
    }

    #[test]
    fn test_builtin_currency_and_accounting_codes() {
        assert_eq!(builtin_code(5), Some("\"$\"#,##0_);(\"$\"#,##0)"));
        assert_eq!(builtin_code(8), Some("\"$\"#,##0.00_);[Red](\"$\"#,##0.00)"));
        assert_eq!(
            builtin_code(42),
            Some("_(\"$\"* #,##0_);_(\"$\"* \\(#,##0\\);_(\"$\"* \"-\"_);_(@_)")
        );

        assert_eq!(builtin_id(r##"_("$"* #,##0.00_);_("$"* \(#,##0.00\);_("$"* "-"??_);_(@_)"##), Some(44));

        let mut styles = StyleSheet::parse(MINIMAL_STYLES);
        let xf = styles.xf_for(None, "\"$\"#,##0.00_);(\"$\"#,##0.00)");
        let xml = styles.apply(MINIMAL_STYLES);
        assert!(!xml.contains("<numFmts"));
        assert!(xml.contains(r#"<xf numFmtId="7" "#));
        assert_eq!(styles.format_code(xf), "\"$\"#,##0.00_);(\"$\"#,##0.00)");
    }

    #[test]
    fn test_unknown_base_falls_back_to_default_record() {
        let mut styles = StyleSheet::parse(MINIMAL_STYLES);
        assert_eq!(styles.xf_for(Some(40), "General"), 0);
    }
}

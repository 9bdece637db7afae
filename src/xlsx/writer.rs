//! Serialize the in-memory model back into its package.
//!
//! Worksheets are regenerated from `prefix + <sheetData> + suffix`; every part
//! the model does not own (macros, drawings, themes, printer settings) is
//! written back byte-for-byte. Formulas are written without cached results and
//! the workbook is flagged for a full recalculation on open.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;
use tracing::{debug, warn};

use super::layout::{SheetLayout, BLANK_PREFIX, BLANK_SUFFIX};
use super::package::{rels_path_for, relative_target, resolve_target, Package, CONTENT_TYPES_PART};
use super::reader::sheet_entries;
use super::relationships::{self, Relationship, STYLES_REL_TYPE, WORKSHEET_REL_TYPE};
use super::styles::{StyleSheet, MINIMAL_STYLES};
use super::xml;
use crate::error::{MigrateError, MigrateResult};
use crate::workbook::{Cell, CellValue, DataValidation, Sheet, ValidationKind, Workbook, GENERAL};

const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const STYLES_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

/// Worksheet children that must follow `<dataValidations>`
const AFTER_DATA_VALIDATIONS: &[&str] = &[
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// Workbook children that must follow `<calcPr>`
const AFTER_CALC_PR: &[&str] = &[
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// Serialize `workbook` into `.xlsx`/`.xlsm` bytes.
///
/// Workbooks loaded with [`read_workbook`](super::read_workbook) are written
/// back into their own package; workbooks built in memory get a minimal one.
pub fn write_workbook(workbook: &Workbook) -> MigrateResult<Vec<u8>> {
    if workbook.sheet_count() == 0 {
        return Err(MigrateError::Configuration(format!(
            "{} has no sheets to write",
            workbook.label()
        )));
    }

    let label = workbook.label();
    let mut package = match &workbook.package {
        Some(package) => package.clone(),
        None => blank_package(),
    };
    let package_id = package.id();
    let workbook_part = package.workbook_part.clone();
    let rels_part = rels_path_for(&workbook_part);

    let mut rels = package
        .text(&rels_part, label)?
        .map(|x| relationships::parse(&x))
        .unwrap_or_default();
    let mut workbook_xml = package
        .text(&workbook_part, label)?
        .ok_or_else(|| MigrateError::input_format(label, format!("missing {}", workbook_part)))?;
    let mut content_types = package
        .text(CONTENT_TYPES_PART, label)?
        .ok_or_else(|| MigrateError::input_format(label, "missing [Content_Types].xml"))?;
    let mut styles = package.styles.clone();

    let original = sheet_entries(&workbook_xml);
    let own_layouts: HashSet<&str> = workbook
        .sheets()
        .iter()
        .filter_map(|sheet| own_layout(sheet, package_id))
        .map(|layout| layout.rel_id.as_str())
        .collect();

    for entry in original.iter().filter(|e| !own_layouts.contains(e.rel_id.as_str())) {
        debug!(sheet = %entry.name, "Dropping removed sheet part");
        drop_relationship(&mut package, &mut rels, &mut content_types, &workbook_part, &entry.rel_id);
    }
    let calc_chains: Vec<String> = rels
        .iter()
        .filter(|r| r.is_type("calcChain"))
        .map(|r| r.id.clone())
        .collect();
    for rel_id in calc_chains {
        drop_relationship(&mut package, &mut rels, &mut content_types, &workbook_part, &rel_id);
    }

    let mut next_sheet_id = original.iter().map(|e| e.sheet_id).max().unwrap_or(0) + 1;
    let mut entries = String::new();
    let mut new_positions: HashMap<String, usize> = HashMap::new();

    for (index, sheet) in workbook.sheets().iter().enumerate() {
        if let Some(layout) = own_layout(sheet, package_id) {
            new_positions.insert(layout.rel_id.clone(), index);
            entries.push_str(&xml::set_attr(&layout.entry_xml, "name", sheet.name()));
            if !layout.is_opaque() {
                let sheet_xml = render_worksheet(sheet, &layout.prefix, &layout.suffix, &layout.row_attrs, &mut styles);
                package.set_part(layout.part_name.clone(), sheet_xml.into_bytes());
            }
            continue;
        }

        if !sheet.is_worksheet() {
            warn!(sheet = %sheet.name(), "Tab from another package cannot be carried; writing an empty worksheet");
        }
        let part = next_worksheet_part(&package);
        let rel_id = relationships::next_id(&rels);
        rels.push(Relationship {
            id: rel_id.clone(),
            rel_type: WORKSHEET_REL_TYPE.to_string(),
            target: relative_target(&workbook_part, &part),
            external: false,
        });
        content_types = add_override(&content_types, &part, WORKSHEET_CONTENT_TYPE);
        entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="{}"/>"#,
            xml::escape(sheet.name()),
            next_sheet_id,
            rel_id
        ));
        next_sheet_id += 1;

        let sheet_xml = render_worksheet(sheet, BLANK_PREFIX, BLANK_SUFFIX, &BTreeMap::new(), &mut styles);
        debug!(sheet = %sheet.name(), part = %part, "Adding worksheet part");
        package.set_part(part, sheet_xml.into_bytes());
    }

    let (start, end) = xml::find_element(&workbook_xml, "sheets", 0)
        .ok_or_else(|| MigrateError::input_format(label, "workbook.xml has no <sheets>"))?;
    workbook_xml.replace_range(start..end, &format!("<sheets>{}</sheets>", entries));

    let positions: Vec<Option<usize>> = original
        .iter()
        .map(|e| new_positions.get(&e.rel_id).copied())
        .collect();
    workbook_xml = remap_defined_names(&workbook_xml, &positions);
    workbook_xml = remap_workbook_views(&workbook_xml, &positions);
    workbook_xml = force_full_calculation(&workbook_xml);

    if styles.is_dirty() {
        match package.styles_part.clone() {
            Some(part) => {
                let current = package.text(&part, label)?.unwrap_or_else(|| MINIMAL_STYLES.to_string());
                package.set_part(part, styles.apply(&current).into_bytes());
            }
            None => {
                let part = "xl/styles.xml".to_string();
                rels.push(Relationship {
                    id: relationships::next_id(&rels),
                    rel_type: STYLES_REL_TYPE.to_string(),
                    target: relative_target(&workbook_part, &part),
                    external: false,
                });
                content_types = add_override(&content_types, &part, STYLES_CONTENT_TYPE);
                package.set_part(part, styles.apply(MINIMAL_STYLES).into_bytes());
            }
        }
    }

    package.set_part(rels_part, relationships::to_xml(&rels).into_bytes());
    package.set_part(workbook_part, workbook_xml.into_bytes());
    package.set_part(CONTENT_TYPES_PART, content_types.into_bytes());

    package.to_bytes()
}

fn own_layout(sheet: &Sheet, package_id: u64) -> Option<&SheetLayout> {
    sheet.layout.as_ref().filter(|layout| layout.belongs_to(package_id))
}

fn drop_relationship(
    package: &mut Package,
    rels: &mut Vec<Relationship>,
    content_types: &mut String,
    workbook_part: &str,
    rel_id: &str,
) {
    let Some(pos) = rels.iter().position(|r| r.id == rel_id) else {
        return;
    };
    let rel = rels.remove(pos);
    let part = resolve_target(workbook_part, &rel.target);
    package.remove_part(&part);
    package.remove_part(&rels_path_for(&part));
    *content_types = remove_override(content_types, &part);
}

fn next_worksheet_part(package: &Package) -> String {
    (1..)
        .map(|n| format!("xl/worksheets/sheet{}.xml", n))
        .find(|name| !package.contains(name))
        .unwrap_or_else(|| "xl/worksheets/sheet.xml".to_string())
}

fn add_override(content_types: &str, part: &str, content_type: &str) -> String {
    let part_name = format!("/{}", part);
    if content_types.contains(&format!(r#"PartName="{}""#, part_name)) {
        return content_types.to_string();
    }
    let entry = format!(
        r#"<Override PartName="{}" ContentType="{}"/>"#,
        xml::escape(&part_name),
        content_type
    );
    match content_types.rfind("</Types>") {
        Some(at) => {
            let mut out = content_types.to_string();
            out.insert_str(at, &entry);
            out
        }
        None => content_types.to_string(),
    }
}

fn remove_override(content_types: &str, part: &str) -> String {
    let pattern = format!(
        r#"<Override\b[^>]*PartName="/{}"[^>]*/>"#,
        regex::escape(part)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(content_types, "").into_owned(),
        Err(_) => content_types.to_string(),
    }
}

/// Re-point `localSheetId` at each sheet's new tab index; names scoped to removed sheets go
fn remap_defined_names(workbook_xml: &str, positions: &[Option<usize>]) -> String {
    let Ok(re) = Regex::new(r"(?s)<definedName\b[^>]*>.*?</definedName>") else {
        return workbook_xml.to_string();
    };
    let remapped = re.replace_all(workbook_xml, |caps: &regex::Captures| {
        let element = &caps[0];
        let local = xml::attr(element, "localSheetId").and_then(|v| v.parse::<usize>().ok());
        match local.map(|old| positions.get(old).copied().flatten()) {
            Some(Some(new)) => xml::set_attr(element, "localSheetId", &new.to_string()),
            Some(None) => String::new(),
            None => element.to_string(),
        }
    });
    match Regex::new(r"<definedNames>\s*</definedNames>") {
        Ok(empty) => empty.replace_all(&remapped, "").into_owned(),
        Err(_) => remapped.into_owned(),
    }
}

fn remap_workbook_views(workbook_xml: &str, positions: &[Option<usize>]) -> String {
    let mut out = workbook_xml.to_string();
    for (start, end) in xml::find_all(workbook_xml, "workbookView").into_iter().rev() {
        let mut element = out[start..end].to_string();
        for key in ["activeTab", "firstSheet"] {
            if let Some(old) = xml::attr(&element, key).and_then(|v| v.parse::<usize>().ok()) {
                let new = positions.get(old).copied().flatten().unwrap_or(0);
                element = xml::set_attr(&element, key, &new.to_string());
            }
        }
        out.replace_range(start..end, &element);
    }
    out
}

fn force_full_calculation(workbook_xml: &str) -> String {
    if let Some((start, end)) = xml::find_element(workbook_xml, "calcPr", 0) {
        let mut out = workbook_xml.to_string();
        let element = xml::set_attr(&workbook_xml[start..end], "fullCalcOnLoad", "1");
        out.replace_range(start..end, &element);
        return out;
    }
    let at = AFTER_CALC_PR
        .iter()
        .filter_map(|tag| xml::find_element(workbook_xml, tag, 0).map(|(s, _)| s))
        .min()
        .or_else(|| workbook_xml.rfind("</workbook>"))
        .unwrap_or(workbook_xml.len());
    let mut out = workbook_xml.to_string();
    out.insert_str(at, r#"<calcPr fullCalcOnLoad="1"/>"#);
    out
}

fn render_worksheet(
    sheet: &Sheet,
    prefix: &str,
    suffix: &str,
    row_attrs: &BTreeMap<u32, Vec<(String, String)>>,
    styles: &mut StyleSheet,
) -> String {
    let mut rows: BTreeMap<u32, Vec<(u32, &Cell)>> = BTreeMap::new();
    for (at, cell) in sheet.cells().filter(|(_, cell)| !cell.is_blank()) {
        rows.entry(at.row).or_default().push((at.col, cell));
    }
    for row in row_attrs.keys() {
        rows.entry(*row).or_default();
    }

    let mut out = String::with_capacity(prefix.len() + suffix.len() + rows.len() * 64);
    out.push_str(&update_dimension(prefix, &dimension(&rows)));
    out.push_str("<sheetData>");
    for (row, cells) in &rows {
        out.push_str(&format!(r#"<row r="{}""#, row));
        for (key, value) in row_attrs.get(row).map(Vec::as_slice).unwrap_or(&[]) {
            out.push_str(&format!(r#" {}="{}""#, key, xml::escape(value)));
        }
        if cells.is_empty() {
            out.push_str("/>");
            continue;
        }
        out.push('>');
        for (col, cell) in cells {
            let reference = format!("{}{}", crate::workbook::column_letters(*col), row);
            write_cell(&mut out, &reference, cell, styles);
        }
        out.push_str("</row>");
    }
    out.push_str("</sheetData>");
    out.push_str(&insert_validations(suffix, sheet.data_validations()));
    out
}

fn dimension(rows: &BTreeMap<u32, Vec<(u32, &Cell)>>) -> String {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (row, cells) in rows {
        for (col, _) in cells {
            bounds = Some(match bounds {
                None => (*row, *col, *row, *col),
                Some((r0, c0, r1, c1)) => (r0.min(*row), c0.min(*col), r1.max(*row), c1.max(*col)),
            });
        }
    }
    match bounds {
        None => "A1".to_string(),
        Some((r0, c0, r1, c1)) if (r0, c0) == (r1, c1) => {
            format!("{}{}", crate::workbook::column_letters(c0), r0)
        }
        Some((r0, c0, r1, c1)) => format!(
            "{}{}:{}{}",
            crate::workbook::column_letters(c0),
            r0,
            crate::workbook::column_letters(c1),
            r1
        ),
    }
}

fn update_dimension(prefix: &str, reference: &str) -> String {
    match xml::find_element(prefix, "dimension", 0) {
        Some((start, end)) => {
            let mut out = prefix.to_string();
            out.replace_range(start..end, &format!(r#"<dimension ref="{}"/>"#, reference));
            out
        }
        None => prefix.to_string(),
    }
}

fn write_cell(out: &mut String, reference: &str, cell: &Cell, styles: &mut StyleSheet) {
    let xf = if cell.style_id().is_some() || cell.number_format != GENERAL {
        styles.xf_for(cell.style_id(), &cell.number_format)
    } else {
        0
    };
    let style = if xf == 0 {
        String::new()
    } else {
        format!(r#" s="{}""#, xf)
    };

    match &cell.value {
        CellValue::Empty => out.push_str(&format!(r#"<c r="{}"{}/>"#, reference, style)),
        CellValue::Text(text) => out.push_str(&format!(
            r#"<c r="{}"{} t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            reference,
            style,
            xml::escape(text)
        )),
        CellValue::Number(n) if n.is_finite() => {
            out.push_str(&format!(r#"<c r="{}"{}><v>{}</v></c>"#, reference, style, n))
        }
        CellValue::Number(_) => out.push_str(&format!(
            r#"<c r="{}"{} t="e"><v>#NUM!</v></c>"#,
            reference, style
        )),
        CellValue::Bool(b) => out.push_str(&format!(
            r#"<c r="{}"{} t="b"><v>{}</v></c>"#,
            reference,
            style,
            u8::from(*b)
        )),
        CellValue::Error(e) => out.push_str(&format!(
            r#"<c r="{}"{} t="e"><v>{}</v></c>"#,
            reference,
            style,
            xml::escape(e)
        )),
        CellValue::Formula(text) => out.push_str(&format!(
            r#"<c r="{}"{}><f>{}</f></c>"#,
            reference,
            style,
            xml::escape(formula_body(text))
        )),
        CellValue::ArrayFormula { text, range } => out.push_str(&format!(
            r#"<c r="{}"{}><f t="array" ref="{}">{}</f></c>"#,
            reference,
            style,
            xml::escape(range),
            xml::escape(formula_body(text))
        )),
    }
}

fn formula_body(text: &str) -> &str {
    text.strip_prefix('=').unwrap_or(text)
}

fn insert_validations(suffix: &str, validations: &[DataValidation]) -> String {
    if validations.is_empty() {
        return suffix.to_string();
    }

    let mut block = format!(r#"<dataValidations count="{}">"#, validations.len());
    for validation in validations {
        block.push_str(&validation_xml(validation));
    }
    block.push_str("</dataValidations>");

    let at = xml::top_level_elements(suffix)
        .into_iter()
        .find(|(name, _, _)| AFTER_DATA_VALIDATIONS.contains(&name.as_str()))
        .map(|(_, start, _)| start)
        .or_else(|| suffix.rfind("</worksheet>"))
        .unwrap_or(suffix.len());

    let mut out = suffix.to_string();
    out.insert_str(at, &block);
    out
}

fn validation_xml(validation: &DataValidation) -> String {
    let mut out = String::from("<dataValidation");
    if validation.kind != ValidationKind::Any {
        out.push_str(&format!(r#" type="{}""#, validation.kind.as_str()));
    }
    let optional = [
        ("errorStyle", &validation.error_style),
        ("operator", &validation.operator),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            out.push_str(&format!(r#" {}="{}""#, key, xml::escape(value)));
        }
    }
    let flags = [
        ("allowBlank", validation.allow_blank),
        ("showDropDown", validation.hide_dropdown),
        ("showInputMessage", validation.show_input_message),
        ("showErrorMessage", validation.show_error_message),
    ];
    for (key, on) in flags {
        if on {
            out.push_str(&format!(r#" {}="1""#, key));
        }
    }
    let messages = [
        ("errorTitle", &validation.error_title),
        ("error", &validation.error),
        ("promptTitle", &validation.prompt_title),
        ("prompt", &validation.prompt),
    ];
    for (key, value) in messages {
        if let Some(value) = value {
            out.push_str(&format!(r#" {}="{}""#, key, xml::escape(value)));
        }
    }
    out.push_str(&format!(r#" sqref="{}">"#, xml::escape(&validation.sqref)));
    if let Some(formula) = &validation.formula1 {
        out.push_str(&format!("<formula1>{}</formula1>", xml::escape(formula)));
    }
    if let Some(formula) = &validation.formula2 {
        out.push_str(&format!("<formula2>{}</formula2>", xml::escape(formula)));
    }
    out.push_str("</dataValidation>");
    out
}

fn blank_package() -> Package {
    let mut parts = BTreeMap::new();
    parts.insert(
        CONTENT_TYPES_PART.to_string(),
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                r#"<Override PartName="/xl/workbook.xml" ContentType="{}"/>"#,
                r#"<Override PartName="/xl/styles.xml" ContentType="{}"/>"#,
                r#"</Types>"#
            ),
            WORKBOOK_CONTENT_TYPE, STYLES_CONTENT_TYPE
        )
        .into_bytes(),
    );
    parts.insert(
        "_rels/.rels".to_string(),
        relationships::to_xml(&[Relationship {
            id: "rId1".to_string(),
            rel_type: "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument".to_string(),
            target: "xl/workbook.xml".to_string(),
            external: false,
        }])
        .into_bytes(),
    );
    parts.insert(
        "xl/workbook.xml".to_string(),
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
            r#"<bookViews><workbookView activeTab="0"/></bookViews><sheets></sheets><calcPr calcId="191029"/>"#,
            r#"</workbook>"#
        )
        .as_bytes()
        .to_vec(),
    );
    parts.insert(
        "xl/_rels/workbook.xml.rels".to_string(),
        relationships::to_xml(&[Relationship {
            id: "rId1".to_string(),
            rel_type: STYLES_REL_TYPE.to_string(),
            target: "styles.xml".to_string(),
            external: false,
        }])
        .into_bytes(),
    );
    parts.insert("xl/styles.xml".to_string(), MINIMAL_STYLES.as_bytes().to_vec());

    let mut package = Package::from_parts(parts);
    package.styles_part = Some("xl/styles.xml".to_string());
    package.styles = StyleSheet::parse(MINIMAL_STYLES);
    package
}

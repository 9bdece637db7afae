//! Load a workbook package into the in-memory model

use std::collections::{BTreeMap, HashMap};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::formula_refs::shift_references;
use super::layout::SheetLayout;
use super::package::{rels_path_for, resolve_target, Package};
use super::relationships::{self, Relationship};
use super::styles::{StyleSheet, MINIMAL_STYLES};
use super::xml;
use crate::error::{MigrateError, MigrateResult};
use crate::workbook::{Cell, CellRef, CellValue, DataValidation, Sheet, ValidationKind, Workbook, GENERAL};

/// One `<sheet>` entry of `workbook.xml`, in tab order
#[derive(Debug, Clone)]
pub(crate) struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    pub raw: String,
}

pub(crate) fn sheet_entries(workbook_xml: &str) -> Vec<SheetEntry> {
    let Some((start, end)) = xml::find_element(workbook_xml, "sheets", 0) else {
        return Vec::new();
    };
    let block = &workbook_xml[start..end];
    xml::find_all(block, "sheet")
        .into_iter()
        .filter_map(|(s, e)| {
            let raw = &block[s..e];
            let attrs = xml::attributes(raw);
            let get = |key: &str| attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
            Some(SheetEntry {
                name: get("name")?,
                sheet_id: get("sheetId").and_then(|v| v.parse().ok()).unwrap_or(0),
                rel_id: get("r:id")?,
                raw: raw.to_string(),
            })
        })
        .collect()
}

struct ReadContext<'a> {
    label: &'a str,
    package_id: u64,
    shared_strings: &'a [String],
    styles: &'a StyleSheet,
}

/// Parse `.xlsx` / `.xlsm` bytes. `label` names the workbook in errors.
pub fn read_workbook(bytes: &[u8], label: &str) -> MigrateResult<Workbook> {
    let mut package = Package::from_bytes(bytes, label)?;
    let workbook_part = office_document_part(&package, label)?;
    let workbook_xml = package
        .text(&workbook_part, label)?
        .ok_or_else(|| MigrateError::input_format(label, format!("missing {}", workbook_part)))?;
    let rels: Vec<Relationship> = package
        .text(&rels_path_for(&workbook_part), label)?
        .map(|x| relationships::parse(&x))
        .unwrap_or_default();

    let shared_strings = match rels.iter().find(|r| r.is_type("sharedStrings")) {
        Some(rel) => {
            let part = resolve_target(&workbook_part, &rel.target);
            match package.text(&part, label)? {
                Some(x) => parse_shared_strings(&x, label)?,
                None => Vec::new(),
            }
        }
        None => Vec::new(),
    };

    let mut styles_part = None;
    let mut styles = StyleSheet::parse(MINIMAL_STYLES);
    if let Some(rel) = rels.iter().find(|r| r.is_type("styles")) {
        let part = resolve_target(&workbook_part, &rel.target);
        if let Some(x) = package.text(&part, label)? {
            styles = StyleSheet::parse(&x);
            styles_part = Some(part);
        }
    }

    let ctx = ReadContext {
        label,
        package_id: package.id(),
        shared_strings: &shared_strings,
        styles: &styles,
    };

    let mut workbook = Workbook::new(label);
    for entry in sheet_entries(&workbook_xml) {
        let rel = rels.iter().find(|r| r.id == entry.rel_id).ok_or_else(|| {
            MigrateError::input_format(
                label,
                format!("sheet '{}' points at unknown relationship {}", entry.name, entry.rel_id),
            )
        })?;
        let part = resolve_target(&workbook_part, &rel.target);

        let sheet = if rel.is_type("worksheet") {
            let sheet_xml = package.text(&part, label)?.ok_or_else(|| {
                MigrateError::input_format(label, format!("sheet '{}' is missing part {}", entry.name, part))
            })?;
            parse_worksheet(&sheet_xml, &entry, part, &ctx)?
        } else {
            debug!(sheet = %entry.name, rel_type = %rel.rel_type, "Carrying non-worksheet tab as-is");
            let mut sheet = Sheet::new(entry.name.clone());
            sheet.layout = Some(SheetLayout::opaque(
                ctx.package_id,
                part,
                entry.rel_id.clone(),
                entry.raw.clone(),
            ));
            sheet
        };

        workbook.add_sheet(sheet).map_err(|_| {
            MigrateError::input_format(label, format!("duplicate sheet name '{}'", entry.name))
        })?;
    }

    debug!(
        workbook = label,
        sheets = workbook.sheet_count(),
        shared_strings = shared_strings.len(),
        "Workbook loaded"
    );

    package.workbook_part = workbook_part;
    package.styles_part = styles_part;
    package.styles = styles;
    workbook.package = Some(package);
    Ok(workbook)
}

fn office_document_part(package: &Package, label: &str) -> MigrateResult<String> {
    if let Some(root_rels) = package.text("_rels/.rels", label)? {
        if let Some(rel) = relationships::parse(&root_rels)
            .into_iter()
            .find(|r| r.is_type("officeDocument"))
        {
            return Ok(resolve_target("", &rel.target));
        }
    }
    if package.contains("xl/workbook.xml") {
        return Ok("xl/workbook.xml".to_string());
    }
    Err(MigrateError::input_format(label, "no workbook part in package"))
}

fn xml_error(label: &str, part: &str, err: impl std::fmt::Display) -> MigrateError {
    MigrateError::input_format(label, format!("malformed {}: {}", part, err))
}

fn parse_shared_strings(sst_xml: &str, label: &str) -> MigrateResult<Vec<String>> {
    let mut reader = Reader::from_str(sst_xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|err| xml_error(label, "sharedStrings", err))?;
                current.push_str(&text);
            }
            Ok(Event::CData(e)) if in_text => current.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(label, "sharedStrings", err)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum Capture {
    Nothing,
    Formula,
    Value,
    InlineText,
}

struct OpenCell {
    at: CellRef,
    style: Option<u32>,
    kind: Option<String>,
}

struct FormulaTag {
    kind: String,
    reference: Option<String>,
    shared_index: Option<u32>,
    text: String,
}

impl FormulaTag {
    fn from_start(e: &BytesStart<'_>) -> Self {
        let mut tag = FormulaTag {
            kind: "normal".to_string(),
            reference: None,
            shared_index: None,
            text: String::new(),
        };
        for attr in e.attributes().flatten() {
            let value = attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
            match attr.key.as_ref() {
                b"t" => tag.kind = value,
                b"ref" => tag.reference = Some(value),
                b"si" => tag.shared_index = value.parse().ok(),
                _ => {}
            }
        }
        tag
    }
}

fn open_row(e: &BytesStart<'_>, previous: u32, layout_rows: &mut BTreeMap<u32, Vec<(String, String)>>) -> u32 {
    let mut row = None;
    let mut extra = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
        match key.as_str() {
            "r" => row = value.parse().ok(),
            "spans" => {}
            _ => extra.push((key, value)),
        }
    }
    let row = row.unwrap_or(previous + 1);
    if !extra.is_empty() {
        layout_rows.insert(row, extra);
    }
    row
}

fn open_cell(e: &BytesStart<'_>, row: u32, col: &mut u32) -> OpenCell {
    let mut at = None;
    let mut style = None;
    let mut kind = None;
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value().map(|v| v.into_owned()).unwrap_or_default();
        match attr.key.as_ref() {
            b"r" => at = CellRef::parse(&value),
            b"s" => style = value.parse().ok(),
            b"t" => kind = Some(value),
            _ => {}
        }
    }
    let at = at.unwrap_or_else(|| CellRef::new(row.max(1), *col + 1));
    *col = at.col;
    OpenCell { at, style, kind }
}

struct SharedFormulas {
    anchors: HashMap<u32, (CellRef, String)>,
    followers: Vec<(CellRef, u32)>,
}

fn cell_value(
    cell: &OpenCell,
    formula: Option<FormulaTag>,
    cached: &str,
    inline: &str,
    shared: &mut SharedFormulas,
    ctx: &ReadContext<'_>,
) -> CellValue {
    if let Some(f) = formula {
        match f.kind.as_str() {
            "array" => {
                let range = f.reference.unwrap_or_else(|| cell.at.to_a1());
                return CellValue::array_formula(f.text, range);
            }
            "shared" => {
                if let Some(si) = f.shared_index {
                    if f.text.is_empty() {
                        shared.followers.push((cell.at, si));
                    } else {
                        shared.anchors.insert(si, (cell.at, f.text.clone()));
                        return CellValue::formula(f.text);
                    }
                }
            }
            "dataTable" => {}
            _ if !f.text.is_empty() => return CellValue::formula(f.text),
            _ => {}
        }
    }

    match cell.kind.as_deref() {
        Some("s") => cached
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| ctx.shared_strings.get(i))
            .map_or(CellValue::Empty, |s| CellValue::Text(s.clone())),
        Some("inlineStr") => CellValue::Text(inline.to_string()),
        Some("b") => CellValue::Bool(matches!(cached.trim(), "1" | "true")),
        Some("e") => CellValue::Error(cached.to_string()),
        Some("str") | Some("d") => CellValue::Text(cached.to_string()),
        _ => {
            let trimmed = cached.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                trimmed
                    .parse::<f64>()
                    .map(CellValue::Number)
                    .unwrap_or_else(|_| CellValue::Text(cached.to_string()))
            }
        }
    }
}

fn parse_worksheet(
    sheet_xml: &str,
    entry: &SheetEntry,
    part_name: String,
    ctx: &ReadContext<'_>,
) -> MigrateResult<Sheet> {
    let (data_start, data_end) = xml::find_element(sheet_xml, "sheetData", 0).ok_or_else(|| {
        MigrateError::input_format(ctx.label, format!("sheet '{}' has no sheetData", entry.name))
    })?;
    let tag_end = xml::start_tag_end(sheet_xml, data_start).unwrap_or(data_end);
    let body = if tag_end == data_end {
        ""
    } else {
        &sheet_xml[tag_end..data_end - "</sheetData>".len()]
    };

    let prefix = sheet_xml[..data_start].to_string();
    let mut suffix = sheet_xml[data_end..].to_string();
    let mut sheet = Sheet::new(entry.name.clone());

    if let Some((start, end)) = xml::find_element(&suffix, "dataValidations", 0) {
        for validation in parse_validations(&suffix[start..end]) {
            sheet.push_loaded_validation(validation);
        }
        suffix.replace_range(start..end, "");
    }

    let mut row_attrs = BTreeMap::new();
    let mut shared = SharedFormulas {
        anchors: HashMap::new(),
        followers: Vec::new(),
    };

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut row = 0u32;
    let mut col = 0u32;
    let mut open: Option<OpenCell> = None;
    let mut formula: Option<FormulaTag> = None;
    let mut cached = String::new();
    let mut inline = String::new();
    let mut capture = Capture::Nothing;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"row" => {
                    row = open_row(&e, row, &mut row_attrs);
                    col = 0;
                }
                b"c" => {
                    open = Some(open_cell(&e, row, &mut col));
                    formula = None;
                    cached.clear();
                    inline.clear();
                }
                b"f" => {
                    formula = Some(FormulaTag::from_start(&e));
                    capture = Capture::Formula;
                }
                b"v" => capture = Capture::Value,
                b"t" if !in_phonetic => capture = Capture::InlineText,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"row" => {
                    row = open_row(&e, row, &mut row_attrs);
                    col = 0;
                }
                b"c" => {
                    let cell = open_cell(&e, row, &mut col);
                    if let Some(style) = cell.style {
                        sheet.set_cell(
                            cell.at.row,
                            cell.at.col,
                            Cell::new(CellValue::Empty, ctx.styles.format_code(style)).with_style(Some(style)),
                        );
                    }
                }
                b"f" => formula = Some(FormulaTag::from_start(&e)),
                _ => {}
            },
            Ok(Event::Text(e)) if capture != Capture::Nothing => {
                let text = e.unescape().map_err(|err| xml_error(ctx.label, &part_name, err))?;
                match capture {
                    Capture::Formula => {
                        if let Some(f) = formula.as_mut() {
                            f.text.push_str(&text);
                        }
                    }
                    Capture::Value => cached.push_str(&text),
                    Capture::InlineText => inline.push_str(&text),
                    Capture::Nothing => {}
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"f" | b"v" | b"t" => capture = Capture::Nothing,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(cell) = open.take() {
                        let value = cell_value(&cell, formula.take(), &cached, &inline, &mut shared, ctx);
                        if !value.is_empty() || cell.style.is_some() {
                            let format = cell
                                .style
                                .map_or_else(|| GENERAL.to_string(), |s| ctx.styles.format_code(s));
                            sheet.set_cell(
                                cell.at.row,
                                cell.at.col,
                                Cell::new(value, format).with_style(cell.style),
                            );
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(ctx.label, &part_name, err)),
            _ => {}
        }
        buf.clear();
    }

    for (at, si) in shared.followers {
        if let Some((anchor, text)) = shared.anchors.get(&si) {
            let shifted = shift_references(
                text,
                i64::from(at.row) - i64::from(anchor.row),
                i64::from(at.col) - i64::from(anchor.col),
            );
            sheet.set_value(at.row, at.col, CellValue::formula(shifted));
        }
    }

    sheet.layout = Some(SheetLayout {
        package_id: ctx.package_id,
        part_name,
        rel_id: entry.rel_id.clone(),
        entry_xml: entry.raw.clone(),
        prefix,
        suffix,
        row_attrs,
        opaque: false,
    });
    Ok(sheet)
}

fn parse_validations(block: &str) -> Vec<DataValidation> {
    xml::find_all(block, "dataValidation")
        .into_iter()
        .map(|(start, end)| {
            let element = &block[start..end];
            let mut validation = DataValidation::default();
            for (key, value) in xml::attributes(element) {
                let flag = matches!(value.as_str(), "1" | "true");
                match key.as_str() {
                    "type" => validation.kind = ValidationKind::parse(&value),
                    "sqref" => validation.sqref = value,
                    "operator" => validation.operator = Some(value),
                    "allowBlank" => validation.allow_blank = flag,
                    "showDropDown" => validation.hide_dropdown = flag,
                    "showInputMessage" => validation.show_input_message = flag,
                    "showErrorMessage" => validation.show_error_message = flag,
                    "errorStyle" => validation.error_style = Some(value),
                    "errorTitle" => validation.error_title = Some(value),
                    "error" => validation.error = Some(value),
                    "promptTitle" => validation.prompt_title = Some(value),
                    "prompt" => validation.prompt = Some(value),
                    _ => {}
                }
            }
            validation.formula1 = child_text(element, "formula1");
            validation.formula2 = child_text(element, "formula2");
            validation
        })
        .collect()
}

fn child_text(element: &str, tag: &str) -> Option<String> {
    let (start, end) = xml::find_element(element, tag, 0)?;
    let inner_start = xml::start_tag_end(element, start)?;
    let close = format!("</{}>", tag);
    if inner_start == end {
        return Some(String::new());
    }
    let raw = &element[inner_start..end - close.len()];
    Some(
        quick_xml::escape::unescape(raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

//! Package I/O tests: reading rust_xlsxwriter output, patching it, and reading
//! the result back with calamine

mod common;

use calamine::{Data, Reader};
use common::*;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::{DataValidation as XlsxValidation, Format, Formula};
use sheet_migrate::workbook::ValidationKind;
use sheet_migrate::{read_workbook, write_workbook, Cell, CellValue, MigrateError, Sheet, Workbook};

fn fixture() -> Vec<u8> {
    build_workbook(&["Summary", "Data Validation", "Archive"], |name, ws| {
        match name {
            "Summary" => {
                let date = Format::new().set_num_format("yyyy-mm-dd");
                let pct = Format::new().set_num_format("0.0%");
                ws.write_string(0, 0, "Opened")?;
                ws.write_number_with_format(0, 1, 45000.0, &date)?;
                ws.write_number_with_format(1, 1, 0.25, &pct)?;
                ws.write_boolean(2, 1, true)?;
                ws.write_formula(3, 1, "=B2*2")?;
                let list = XlsxValidation::new()
                    .allow_list_formula(Formula::new("='Data Validation'!$A$2:$A$4"));
                ws.add_data_validation(4, 1, 20, 1, &list)?;
            }
            "Data Validation" => {
                ws.write_string(1, 0, "Yes")?;
                ws.write_string(2, 0, "No")?;
            }
            _ => {}
        }
        Ok(())
    })
}

#[test]
fn test_read_sheet_order_values_and_formats() {
    let workbook = read_workbook(&fixture(), "fixture").unwrap();

    assert_eq!(workbook.sheet_names(), vec!["Summary", "Data Validation", "Archive"]);
    let summary = workbook.sheet("Summary").unwrap();
    assert_eq!(summary.value(1, 1), &CellValue::text("Opened"));
    assert_eq!(summary.value(1, 2), &CellValue::Number(45000.0));
    assert_eq!(summary.number_format(1, 2), "yyyy-mm-dd");
    assert_eq!(summary.number_format(2, 2), "0.0%");
    assert_eq!(summary.value(3, 2), &CellValue::Bool(true));
    assert_eq!(summary.value(4, 2), &CellValue::formula("=B2*2"));
    assert!(!workbook.has_vba_project());
}

#[test]
fn test_read_data_validations() {
    let workbook = read_workbook(&fixture(), "fixture").unwrap();
    let rules = workbook.sheet("Summary").unwrap().data_validations();

    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].kind, ValidationKind::List);
    assert_eq!(rules[0].sqref, "B5:B21");
    assert_eq!(
        rules[0].formula1.as_deref(),
        Some("'Data Validation'!$A$2:$A$4")
    );
}

#[test]
fn test_round_trip_keeps_unowned_parts_byte_for_byte() {
    let original = fixture();
    let workbook = read_workbook(&original, "fixture").unwrap();
    let written = write_workbook(&workbook).unwrap();

    for part in ["xl/theme/theme1.xml", "docProps/core.xml", "docProps/app.xml"] {
        assert_eq!(zip_part(&written, part), zip_part(&original, part), "{}", part);
    }
    assert!(zip_part(&written, "xl/calcChain.xml").is_none());

    let mut book = open(written);
    let summary = values(&mut book, "Summary");
    assert_eq!(value_at(&summary, 1, 1), Data::String("Opened".into()));
    assert_eq!(value_at(&summary, 2, 2), Data::Float(0.25));
    assert_eq!(value_at(&summary, 3, 2), Data::Bool(true));
    assert_eq!(formula_at(&formulas(&mut book, "Summary"), 4, 2), "B2*2");
}

#[test]
fn test_number_formats_survive_write_and_read() {
    let mut workbook = read_workbook(&fixture(), "fixture").unwrap();
    let archive = workbook.sheet_mut("Archive").unwrap();
    archive.set_cell(2, 3, Cell::new(CellValue::Number(1234.567), "#,##0.000"));
    archive.set_cell(3, 3, Cell::new(CellValue::Number(45292.0), "yyyy-mm-dd"));

    let written = write_workbook(&workbook).unwrap();
    let reread = read_workbook(&written, "written").unwrap();
    let archive = reread.sheet("Archive").unwrap();

    assert_eq!(archive.number_format(2, 3), "#,##0.000");
    assert_eq!(archive.number_format(3, 3), "yyyy-mm-dd");
    assert_eq!(reread.sheet("Summary").unwrap().number_format(2, 2), "0.0%");
}

#[test]
fn test_inserted_and_removed_sheets() {
    let mut workbook = read_workbook(&fixture(), "fixture").unwrap();
    let mut added = Sheet::new("Added");
    added.set_value(1, 1, CellValue::text("fresh"));
    added.set_value(2, 1, CellValue::Number(7.0));
    workbook.insert_sheet_after("Summary", added).unwrap();
    assert!(workbook.remove_sheet("Archive").is_some());

    let written = write_workbook(&workbook).unwrap();
    let mut book = open(written.clone());
    assert_eq!(book.sheet_names(), vec!["Summary", "Added", "Data Validation"]);
    let added = values(&mut book, "Added");
    assert_eq!(value_at(&added, 1, 1), Data::String("fresh".into()));
    assert_eq!(value_at(&added, 2, 1), Data::Float(7.0));

    let reread = read_workbook(&written, "written").unwrap();
    assert_eq!(reread.sheet_names(), vec!["Summary", "Added", "Data Validation"]);
}

#[test]
fn test_sheet_from_another_package_is_written_as_new() {
    let other = build_workbook(&["Imported"], |_, ws| {
        ws.write_string(4, 2, "from elsewhere")?;
        Ok(())
    });
    let imported = read_workbook(&other, "other")
        .unwrap()
        .sheet("Imported")
        .unwrap()
        .clone();

    let mut workbook = read_workbook(&fixture(), "fixture").unwrap();
    workbook.add_sheet(imported).unwrap();
    let written = write_workbook(&workbook).unwrap();

    let mut book = open(written);
    assert_eq!(book.sheet_names().len(), 4);
    let sheet = values(&mut book, "Imported");
    assert_eq!(value_at(&sheet, 5, 3), Data::String("from elsewhere".into()));
}

#[test]
fn test_workbook_without_package_is_written_from_scratch() {
    let mut workbook = Workbook::new("scratch");
    let mut sheet = Sheet::new("Only");
    sheet.set_value(1, 1, CellValue::text("a & <b>"));
    sheet.set_cell(2, 1, Cell::new(CellValue::Number(3.5), "0.00"));
    sheet.set_value(3, 1, CellValue::formula("=A2+1"));
    workbook.add_sheet(sheet).unwrap();

    let written = write_workbook(&workbook).unwrap();
    let mut book = open(written.clone());
    let only = values(&mut book, "Only");
    assert_eq!(value_at(&only, 1, 1), Data::String("a & <b>".into()));
    assert_eq!(value_at(&only, 2, 1), Data::Float(3.5));

    let reread = read_workbook(&written, "written").unwrap();
    assert_eq!(reread.sheet("Only").unwrap().number_format(2, 1), "0.00");
}

#[test]
fn test_empty_workbook_cannot_be_written() {
    let err = write_workbook(&Workbook::new("empty")).unwrap_err();
    assert!(matches!(err, MigrateError::Configuration(_)));
}

#[test]
fn test_vba_project_detected_and_preserved() {
    let bytes = with_vba_project(&fixture());
    let workbook = read_workbook(&bytes, "macro template").unwrap();
    assert!(workbook.has_vba_project());

    let written = write_workbook(&workbook).unwrap();
    assert_eq!(zip_part(&written, "xl/vbaProject.bin").as_deref(), Some(VBA_PAYLOAD));
}

#[test]
fn test_garbage_is_input_format() {
    let err = read_workbook(b"PK\x03\x04 truncated", "upload").unwrap_err();
    assert!(matches!(err, MigrateError::InputFormat { ref workbook, .. } if workbook == "upload"));
}

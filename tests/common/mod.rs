//! Shared fixture workbooks for the integration tests
//!
//! Fixtures are written with rust_xlsxwriter so the engine is exercised on
//! packages it did not produce itself. Rows and columns passed to the
//! rust_xlsxwriter closures are 0-indexed; the engine's model is 1-indexed.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const REGION_SHEETS: [&str; 8] = [
    "Assets",
    "Credit Cards",
    "Loans",
    "Loyalty Points & Miles",
    "Recurring",
    "Precedents",
    "Changes",
    "Planned",
];

pub const DATA_VALIDATION: &str = "Data Validation";
pub const AD_HOC: &str = "AD HOC→";
pub const FOOTNOTES: &str = "FOOTNOTES→";

pub const VBA_PAYLOAD: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1fake vba project";

/// Write a workbook with `names` as its tabs, in order, each filled by `fill`
pub fn build_workbook<F>(names: &[&str], mut fill: F) -> Vec<u8>
where
    F: FnMut(&str, &mut Worksheet) -> Result<(), XlsxError>,
{
    let mut workbook = Workbook::new();
    for name in names {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        fill(name, worksheet).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

/// Tabs of a current template: every region sheet, the list source, the anchors
pub fn template_sheets() -> Vec<&'static str> {
    let mut names = REGION_SHEETS.to_vec();
    names.extend([DATA_VALIDATION, AD_HOC, FOOTNOTES]);
    names
}

/// Tabs of an old workbook with `ad_hoc` between the anchors
pub fn source_sheets<'a>(ad_hoc: &[&'a str]) -> Vec<&'a str> {
    let mut names = REGION_SHEETS.to_vec();
    names.push(AD_HOC);
    names.extend_from_slice(ad_hoc);
    names.push(FOOTNOTES);
    names
}

/// A template with a header row on every region sheet and list entries on the
/// validation sheet
pub fn template_bytes() -> Vec<u8> {
    build_workbook(&template_sheets(), |name, ws| {
        match name {
            DATA_VALIDATION => {
                for (i, item) in ["Cash", "Stocks", "Bonds"].iter().enumerate() {
                    ws.write_string(1 + i as u32, 0, *item)?;
                }
            }
            AD_HOC | FOOTNOTES => {}
            _ => {
                ws.write_string(1, 1, "Template header")?;
            }
        }
        Ok(())
    })
}

/// Copy of `bytes` with a VBA project part and the macro-enabled content type
pub fn with_vba_project(bytes: &[u8]) -> Vec<u8> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let name = file.name().to_string();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();

        if name == "[Content_Types].xml" {
            let xml = String::from_utf8(contents).unwrap();
            let xml = xml
                .replace(
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
                    "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
                )
                .replace(
                    "</Types>",
                    r#"<Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/></Types>"#,
                );
            contents = xml.into_bytes();
        } else if name == "xl/_rels/workbook.xml.rels" {
            let xml = String::from_utf8(contents).unwrap();
            let xml = xml.replace(
                "</Relationships>",
                r#"<Relationship Id="rIdVba" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProject" Target="vbaProject.bin"/></Relationships>"#,
            );
            contents = xml.into_bytes();
        }

        writer.start_file(name, options).unwrap();
        writer.write_all(&contents).unwrap();
    }

    writer.start_file("xl/vbaProject.bin", options).unwrap();
    writer.write_all(VBA_PAYLOAD).unwrap();
    writer.finish().unwrap().into_inner()
}

/// One part of a package, raw
pub fn zip_part(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).unwrap();
    Some(contents)
}

/// Open `bytes` with calamine, independently of the engine's own reader
pub fn open(bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
    open_workbook_from_rs(Cursor::new(bytes)).unwrap()
}

pub fn values(workbook: &mut Xlsx<Cursor<Vec<u8>>>, sheet: &str) -> Range<Data> {
    workbook.worksheet_range(sheet).unwrap()
}

pub fn formulas(workbook: &mut Xlsx<Cursor<Vec<u8>>>, sheet: &str) -> Range<String> {
    workbook.worksheet_formula(sheet).unwrap()
}

/// Value at 1-indexed (row, col); `Data::Empty` outside the used range
pub fn value_at(range: &Range<Data>, row: u32, col: u32) -> Data {
    range
        .get_value((row - 1, col - 1))
        .cloned()
        .unwrap_or(Data::Empty)
}

/// Formula text (without `=`) at 1-indexed (row, col); empty when none
pub fn formula_at(range: &Range<String>, row: u32, col: u32) -> String {
    range
        .get_value((row - 1, col - 1))
        .cloned()
        .unwrap_or_default()
}

//! End-to-end migration tests
//!
//! Old workbook + template in, migrated workbook out, read back with calamine
//! and with the engine's own reader.

mod common;

use calamine::{Data, Reader};
use common::*;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Format;
use sheet_migrate::migrate::{
    AnchorPair, MigrationPlan, Migrator, NoProgress, RegionSpec, SheetCollisionPolicy,
    ValidationSpec,
};
use sheet_migrate::{read_workbook, CellValue, MigrateError};
use std::sync::Mutex;

/// The Assets box, 1-indexed: rows 3..=99, columns B..=E
const BOX_ROWS: std::ops::RangeInclusive<u32> = 3..=99;
const BOX_COLS: std::ops::RangeInclusive<u32> = 2..=5;

/// What the old workbook holds at a box cell, and the number format it carries
fn box_cell(row: u32, col: u32) -> (CellValue, &'static str) {
    match col {
        3 => (CellValue::Number(f64::from(row * 10 + col) + 0.25), "#,##0.00"),
        4 if row % 5 == 0 => (CellValue::text(format!("D{} text", row)), "@"),
        4 => (CellValue::text(format!("D{}", row)), "General"),
        5 if row % 2 == 1 => (CellValue::Number(f64::from(row) / 1000.0), "0.0%"),
        _ => (CellValue::Number(f64::from(row * 10 + col)), "General"),
    }
}

/// Cells just outside the box, on all four sides
fn ring() -> Vec<(u32, u32)> {
    let mut cells = Vec::new();
    for col in 1..=6 {
        cells.push((2, col));
        cells.push((100, col));
    }
    for row in BOX_ROWS {
        cells.push((row, 1));
        cells.push((row, 6));
    }
    cells
}

fn expected_data(value: &CellValue) -> Data {
    match value {
        CellValue::Number(n) => Data::Float(*n),
        CellValue::Text(s) => Data::String(s.clone()),
        other => panic!("unexpected fixture value {:?}", other),
    }
}

/// Old workbook: every Assets box cell filled, its own ring filled too, and
/// two ad hoc sheets
fn source_bytes() -> Vec<u8> {
    build_workbook(&source_sheets(&["Trip 2024", "Notes"]), |name, ws| {
        match name {
            "Assets" => {
                for row in BOX_ROWS {
                    for col in BOX_COLS {
                        let (value, code) = box_cell(row, col);
                        let format = Format::new().set_num_format(code);
                        let (r, c) = (row - 1, (col - 1) as u16);
                        match value {
                            CellValue::Number(n) if code == "General" => {
                                ws.write_number(r, c, n)?;
                            }
                            CellValue::Number(n) => {
                                ws.write_number_with_format(r, c, n, &format)?;
                            }
                            CellValue::Text(text) if code == "General" => {
                                ws.write_string(r, c, text)?;
                            }
                            CellValue::Text(text) => {
                                ws.write_string_with_format(r, c, text, &format)?;
                            }
                            _ => {}
                        }
                    }
                }
                for (row, col) in ring() {
                    ws.write_string(row - 1, (col - 1) as u16, format!("old {}:{}", row, col))?;
                }
            }
            "Recurring" => {
                ws.write_string(3, 1, "={Monthly}")?;
            }
            "Trip 2024" => {
                ws.write_string(0, 0, "Flights")?;
                ws.write_number(0, 1, 850.0)?;
                ws.write_array_formula(4, 2, 4, 2, "=EndDayOfCurrentMonth")?;
            }
            "Notes" => {
                ws.write_string(9, 3, "remember")?;
            }
            _ => {}
        }
        Ok(())
    })
}

/// Template whose Assets ring is filled and whose box holds stale content
fn template_with_ring() -> Vec<u8> {
    build_workbook(&template_sheets(), |name, ws| {
        match name {
            DATA_VALIDATION => {
                ws.write_string(1, 0, "Cash")?;
            }
            "Assets" => {
                for (row, col) in ring() {
                    ws.write_string(row - 1, (col - 1) as u16, format!("template {}:{}", row, col))?;
                }
                ws.write_string(49, 2, "stale")?;
            }
            _ => {}
        }
        Ok(())
    })
}

#[test]
fn test_end_to_end_assets_region() {
    let migrated = Migrator::default()
        .migrate_bytes(&source_bytes(), &template_with_ring(), &NoProgress)
        .unwrap();

    let mut book = open(migrated.clone());
    let assets = values(&mut book, "Assets");
    let model = read_workbook(&migrated, "migrated").unwrap();
    let sheet = model.sheet("Assets").unwrap();

    let mut checked = 0;
    for row in BOX_ROWS {
        for col in BOX_COLS {
            let (value, code) = box_cell(row, col);
            assert_eq!(value_at(&assets, row, col), expected_data(&value), "value at {}:{}", row, col);
            assert_eq!(sheet.number_format(row, col), code, "format at {}:{}", row, col);
            checked += 1;
        }
    }
    assert_eq!(checked, 388);

    // outside the box: template untouched, source not copied
    for (row, col) in ring() {
        assert_eq!(
            value_at(&assets, row, col),
            Data::String(format!("template {}:{}", row, col)),
            "ring at {}:{}",
            row,
            col
        );
    }

    let rule = sheet
        .data_validations()
        .iter()
        .find(|rule| rule.sqref == "B4:B99")
        .expect("Assets dropdown");
    assert_eq!(
        rule.formula1.as_deref(),
        Some("'Data Validation'!$A$2:$A$99")
    );
    assert!(rule.allow_blank);
    assert!(rule.show_error_message);
}

#[test]
fn test_legacy_end_of_month_formula_is_rewritten() {
    let source = build_workbook(&source_sheets(&[]), |name, ws| {
        if name == "Assets" {
            ws.write_array_formula(2, 4, 2, 4, "=EndDayOfCurrentMonth")?;
        }
        Ok(())
    });
    let migrated = Migrator::default()
        .migrate_bytes(&source, &template_with_ring(), &NoProgress)
        .unwrap();

    let mut book = open(migrated.clone());
    assert_eq!(formula_at(&formulas(&mut book, "Assets"), 3, 5), "EndOfCurrentMonth");
    // inside the box but blank in the source: overwritten
    assert_eq!(value_at(&values(&mut book, "Assets"), 50, 3), Data::Empty);

    let model = read_workbook(&migrated, "migrated").unwrap();
    let sheet = model.sheet("Assets").unwrap();
    assert_eq!(sheet.value(3, 5), &CellValue::formula("=EndOfCurrentMonth"));
    assert!(!sheet.value(3, 5).is_array_formula());
}

#[test]
fn test_ad_hoc_sheets_land_after_start_anchor_in_order() {
    let migrated = Migrator::default()
        .migrate_bytes(&source_bytes(), &template_bytes(), &NoProgress)
        .unwrap();

    let mut book = open(migrated);
    let names = book.sheet_names();
    let start = names.iter().position(|n| n == AD_HOC).unwrap();
    assert_eq!(
        names[start..].to_vec(),
        vec![AD_HOC, "Trip 2024", "Notes", FOOTNOTES]
    );

    let trip = values(&mut book, "Trip 2024");
    assert_eq!(value_at(&trip, 1, 1), Data::String("Flights".into()));
    assert_eq!(value_at(&trip, 1, 2), Data::Float(850.0));
    let notes = values(&mut book, "Notes");
    assert_eq!(value_at(&notes, 10, 4), Data::String("remember".into()));
}

#[test]
fn test_braces_cleaned_across_workbook() {
    let migrated = Migrator::default()
        .migrate_bytes(&source_bytes(), &template_bytes(), &NoProgress)
        .unwrap();

    let mut book = open(migrated);
    let recurring = values(&mut book, "Recurring");
    assert_eq!(value_at(&recurring, 4, 2), Data::String("=Monthly".into()));
}

#[test]
fn test_progress_checkpoints_are_monotonic_and_finish_at_100() {
    let seen = Mutex::new(Vec::new());
    let sink = |percent: u8, message: &str| {
        seen.lock().unwrap().push((percent, message.to_string()));
    };

    Migrator::default()
        .migrate_bytes(&source_bytes(), &template_bytes(), &sink)
        .unwrap();

    let seen = seen.into_inner().unwrap();
    let percents: Vec<u8> = seen.iter().map(|(p, _)| *p).collect();
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.iter().any(|(_, m)| m == "Copied Planned"));
    assert!(percents.contains(&70));
    assert!(percents.contains(&80));
    assert!(percents.contains(&90));
}

#[test]
fn test_missing_assets_is_not_found_and_produces_nothing() {
    let names: Vec<&str> = source_sheets(&[])
        .into_iter()
        .filter(|name| *name != "Assets")
        .collect();
    let source = build_workbook(&names, |_, _| Ok(()));

    let err = Migrator::default()
        .migrate_bytes(&source, &template_bytes(), &NoProgress)
        .unwrap_err();

    assert!(matches!(err, MigrateError::SheetNotFound { .. }));
    assert_eq!(err.to_string(), "No 'Assets' tab found in source workbook");
}

#[test]
fn test_missing_anchor_is_configuration_error() {
    let names: Vec<&str> = source_sheets(&["Trip 2024"])
        .into_iter()
        .filter(|name| *name != AD_HOC)
        .collect();
    let source = build_workbook(&names, |_, _| Ok(()));

    let err = Migrator::default()
        .migrate_bytes(&source, &template_bytes(), &NoProgress)
        .unwrap_err();

    assert!(matches!(err, MigrateError::Configuration(_)));
    assert!(err.to_string().contains("AD HOC→"));
}

#[test]
fn test_unreadable_source_is_input_format() {
    let err = Migrator::default()
        .migrate_bytes(b"definitely not a zip", &template_bytes(), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, MigrateError::InputFormat { .. }));
    assert!(err.is_client_error());
}

#[test]
fn test_vba_project_passes_through() {
    let template = with_vba_project(&template_bytes());
    let migrated = Migrator::default()
        .migrate_bytes(&source_bytes(), &template, &NoProgress)
        .unwrap();

    assert_eq!(
        zip_part(&migrated, "xl/vbaProject.bin").as_deref(),
        Some(VBA_PAYLOAD)
    );
    let content_types = String::from_utf8(zip_part(&migrated, "[Content_Types].xml").unwrap()).unwrap();
    assert!(content_types.contains("macroEnabled"));
    assert!(read_workbook(&migrated, "migrated").unwrap().has_vba_project());
}

#[test]
fn test_require_macros_rejects_plain_template() {
    let plan = MigrationPlan {
        require_macros: true,
        ..Default::default()
    };
    let err = Migrator::new(plan)
        .migrate_bytes(&source_bytes(), &template_bytes(), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, MigrateError::InputFormat { .. }));
}

#[test]
fn test_custom_plan_with_collision_rename() {
    let source = build_workbook(&["Ledger", AD_HOC, "Budget", FOOTNOTES], |name, ws| {
        match name {
            "Ledger" => {
                ws.write_number(0, 0, 1.0)?;
                ws.write_number(0, 1, 2.0)?;
            }
            "Budget" => {
                ws.write_string(0, 0, "mine")?;
            }
            _ => {}
        }
        Ok(())
    });
    let template = build_workbook(&["Ledger", "Lists", AD_HOC, FOOTNOTES, "budget"], |name, ws| {
        if name == "budget" {
            ws.write_string(0, 0, "template's")?;
        }
        Ok(())
    });

    let plan = MigrationPlan {
        regions: vec![RegionSpec::new("Ledger", 1..=1, 1..=1)],
        validations: vec![ValidationSpec::new("Ledger", "$A$2:$A$10", "Lists!$A$1:$A$5")],
        anchors: Some(AnchorPair::default()),
        sheet_collisions: SheetCollisionPolicy::Rename,
        ..Default::default()
    };
    let (migrated, report) = Migrator::new(plan)
        .migrate_bytes_with_report(&source, &template, &NoProgress)
        .unwrap();

    assert_eq!(report.cells_copied, 1);
    assert_eq!(report.ad_hoc_sheets, vec!["Budget (2)".to_string()]);

    let mut book = open(migrated);
    assert_eq!(
        book.sheet_names(),
        vec!["Ledger", "Lists", AD_HOC, "Budget (2)", FOOTNOTES, "budget"]
    );
    let ledger = values(&mut book, "Ledger");
    assert_eq!(value_at(&ledger, 1, 1), Data::Float(1.0));
    // only the one-cell box was copied
    assert_eq!(value_at(&ledger, 1, 2), Data::Empty);
    let kept = values(&mut book, "budget");
    assert_eq!(value_at(&kept, 1, 1), Data::String("template's".into()));
}

// Ingest -> store -> export round trips through real xlsx files.
// Run with: cargo test -p pscxl-io --test round_trip

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use tempfile::{tempdir, TempDir};

use pscxl_engine::export_plan::SheetNaming;
use pscxl_engine::record::{Record, ReingestPolicy};
use pscxl_io::{export, ingest, ExportOptions, IngestOptions, RecordStore};

/// Write a workbook with one column of string values per sheet.
fn write_source(dir: &TempDir, file_name: &str, sheets: &[(&str, &[&str])]) -> PathBuf {
    let path = dir.path().join(file_name);
    let mut workbook = Workbook::new();
    for (name, values) in sheets {
        let worksheet = workbook.add_worksheet().set_name(*name).unwrap();
        for (row, value) in values.iter().enumerate() {
            worksheet.write_string(row as u32, 0, *value).unwrap();
        }
    }
    workbook.save(&path).unwrap();
    path
}

/// Column A of every sheet in an exported workbook, keyed by sheet name.
fn read_export(path: &Path) -> Vec<(String, Vec<String>)> {
    let mut workbook = open_workbook_auto(path).unwrap();
    let names = workbook.sheet_names().to_vec();
    names
        .into_iter()
        .map(|name| {
            let range = workbook.worksheet_range(&name).unwrap();
            let column = range
                .rows()
                .map(|row| match row.first() {
                    Some(Data::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect();
            (name, column)
        })
        .collect()
}

#[test]
fn stacked_values_round_trip_with_ten_space_runs() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir, "labels.xlsx", &[("Front", &["A B", "A B", "X"])]);

    let mut store = RecordStore::open(&dir.path().join("pscxl.db")).unwrap();
    let result = ingest(&mut store, &source, &IngestOptions::default()).unwrap();
    assert_eq!(result.source, "labels");
    assert_eq!(
        store.list_records("labels", "Front").unwrap(),
        vec![Record::new("A B", 2, true), Record::new("X", 1, false)]
    );

    let out = dir.path().join("export.xlsx");
    let exported = export(&store, &out, &ExportOptions::default()).unwrap();
    assert_eq!(exported.rows, 3);

    let sheets = read_export(&out);
    assert_eq!(sheets.len(), 1);
    let (name, column) = &sheets[0];
    assert_eq!(name, "Front");
    assert_eq!(column[0], "Value");

    let stacked = format!("A{}B", " ".repeat(10));
    let data = &column[1..];
    assert_eq!(data.iter().filter(|v| **v == stacked).count(), 2);
    assert_eq!(data.iter().filter(|v| v.as_str() == "X").count(), 1);
    assert_eq!(data.len(), 3);
}

#[test]
fn header_row_is_value_and_quantity() {
    let dir = tempdir().unwrap();
    let source = write_source(&dir, "wb.xlsx", &[("S", &["X"])]);
    let mut store = RecordStore::open_in_memory().unwrap();
    ingest(&mut store, &source, &IngestOptions::default()).unwrap();

    let out = dir.path().join("out.xlsx");
    export(&store, &out, &ExportOptions::default()).unwrap();

    let mut workbook = open_workbook_auto(&out).unwrap();
    let range = workbook.worksheet_range("S").unwrap();
    let header: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
    assert_eq!(header, vec!["Value", "Quantity"]);
    // Data rows carry the value only
    let second = range.rows().nth(1).unwrap();
    assert_eq!(second[0], Data::String("X".to_string()));
    assert!(second.get(1).map_or(true, |c| *c == Data::Empty));
}

#[test]
fn every_sheet_of_a_source_is_ingested() {
    let dir = tempdir().unwrap();
    let source = write_source(
        &dir,
        "24-0005E2.xlsx",
        &[("Front", &["A", "A", "B"]), ("Back", &["C D"])],
    );
    let mut store = RecordStore::open_in_memory().unwrap();
    let result = ingest(&mut store, &source, &IngestOptions::default()).unwrap();

    assert_eq!(result.sheets.len(), 2);
    assert_eq!(store.list_sources().unwrap(), vec!["24-0005E2"]);
    assert_eq!(store.list_sheets("24-0005E2").unwrap(), vec!["Back", "Front"]);
    assert_eq!(
        store.list_records("24-0005E2", "Back").unwrap(),
        vec![Record::new("C D", 1, true)]
    );
}

#[test]
fn reingest_policies() {
    let dir = tempdir().unwrap();
    let first = write_source(&dir, "wb.xlsx", &[("S", &["OLD", "X"])]);
    let mut store = RecordStore::open_in_memory().unwrap();
    ingest(&mut store, &first, &IngestOptions::default()).unwrap();

    // Same source name, new content
    let second = write_source(&dir, "wb.xlsx", &[("S", &["X", "X"])]);
    let keep = IngestOptions {
        policy: ReingestPolicy::KeepExisting,
        ..Default::default()
    };
    ingest(&mut store, &second, &keep).unwrap();
    assert_eq!(
        store.list_records("wb", "S").unwrap(),
        vec![Record::new("OLD", 1, false), Record::new("X", 1, false)]
    );

    ingest(&mut store, &second, &IngestOptions::default()).unwrap();
    assert_eq!(store.list_records("wb", "S").unwrap(), vec![Record::new("X", 2, false)]);
}

#[test]
fn shared_sheet_names_are_qualified_by_default() {
    let dir = tempdir().unwrap();
    let a = write_source(&dir, "wb1.xlsx", &[("Labels", &["A"])]);
    let b = write_source(&dir, "wb2.xlsx", &[("Labels", &["B"])]);
    let mut store = RecordStore::open_in_memory().unwrap();
    ingest(&mut store, &a, &IngestOptions::default()).unwrap();
    ingest(&mut store, &b, &IngestOptions::default()).unwrap();

    let out = dir.path().join("out.xlsx");
    export(&store, &out, &ExportOptions::default()).unwrap();
    let names: Vec<String> = read_export(&out).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["wb1 - Labels", "wb2 - Labels"]);

    let legacy = dir.path().join("legacy.xlsx");
    let options = ExportOptions {
        naming: SheetNaming::Sheet,
        ..Default::default()
    };
    export(&store, &legacy, &options).unwrap();
    let sheets = read_export(&legacy);
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].1, vec!["Value".to_string(), "B".to_string()]);
}

#[test]
fn unreadable_source_stores_nothing() {
    let dir = tempdir().unwrap();
    let bogus = dir.path().join("broken.xlsx");
    std::fs::write(&bogus, b"not a spreadsheet").unwrap();

    let mut store = RecordStore::open_in_memory().unwrap();
    store.insert_if_absent("broken", "S", "KEEP", 1, false).unwrap();

    assert!(ingest(&mut store, &bogus, &IngestOptions::default()).is_err());
    assert_eq!(
        store.list_records("broken", "S").unwrap(),
        vec![Record::new("KEEP", 1, false)]
    );
}

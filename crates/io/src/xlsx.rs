// Excel import (xlsx, xls, xlsb, ods) and export (xlsx)

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, info};

use pscxl_engine::cell::CellValue;
use pscxl_engine::export_plan::{ExportPlan, HEADER};
use pscxl_engine::sheet::{SheetData, SourceData};

use crate::error::{ExportError, ImportError};
use crate::ingest::source_name;

/// Width of the value column in exported sheets, in characters.
const VALUE_COLUMN_WIDTH: f64 = 40.0;

/// Read every sheet of a workbook in workbook order.
///
/// Rows keep their position: blank rows above the used range come back as empty rows,
/// so skipping a header row always skips the first row of the sheet.
pub fn read_source(path: &Path) -> Result<SourceData, ImportError> {
    let start_time = Instant::now();

    let mut workbook = open_workbook_auto(path).map_err(|e| ImportError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| ImportError::Sheet {
                sheet: sheet_name.clone(),
                message: e.to_string(),
            })?;

        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        if let Some((start_row, _)) = range.start() {
            rows.resize(start_row as usize, Vec::new());
        }
        for row in range.rows() {
            rows.push(row.iter().map(cell_value).collect());
        }

        debug!(sheet = %sheet_name, rows = rows.len(), "read sheet");
        sheets.push(SheetData::new(sheet_name.clone(), rows));
    }

    info!(
        path = %path.display(),
        sheets = sheets.len(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "read workbook"
    );

    Ok(SourceData {
        name: source_name(path),
        sheets,
    })
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::number(*n),
        Data::Int(n) => CellValue::number(*n as f64),
        // Same spelling formulas use for booleans
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        // Dates read as `2024-05-01 00:00:00`
        Data::DateTime(dt) if dt.is_datetime() => match dt.as_datetime() {
            Some(datetime) => CellValue::Text(datetime.to_string()),
            None => CellValue::number(dt.as_f64()),
        },
        Data::DateTime(dt) => CellValue::number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

/// Write an export plan as an xlsx workbook: one worksheet per planned sheet,
/// a bold `Value, Quantity` header, then one value per row in column A.
///
/// Returns the number of data rows written.
pub fn write_plan(plan: &ExportPlan, path: &Path) -> Result<usize, ExportError> {
    let start_time = Instant::now();
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let mut written = 0usize;

    for sheet in &plan.sheets {
        let worksheet = workbook.add_worksheet().set_name(&sheet.name)?;

        for (col, title) in HEADER.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        }
        for (idx, value) in sheet.rows.iter().enumerate() {
            worksheet.write_string((idx + 1) as u32, 0, value)?;
        }
        worksheet.set_column_width(0, VALUE_COLUMN_WIDTH)?;

        written += sheet.rows.len();
        debug!(sheet = %sheet.name, rows = sheet.rows.len(), "wrote sheet");
    }

    workbook.save(path)?;

    info!(
        path = %path.display(),
        sheets = plan.sheets.len(),
        rows = written,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "saved workbook"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};
    use pscxl_engine::export_plan::OutputSheet;
    use tempfile::tempdir;

    #[test]
    fn test_cell_value_mapping() {
        assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
        assert_eq!(cell_value(&Data::Int(4)), CellValue::number(4.0));
        assert_eq!(cell_value(&Data::Float(1.5)), CellValue::number(1.5));
        assert_eq!(cell_value(&Data::Bool(true)), CellValue::text("TRUE"));
        assert_eq!(cell_value(&Data::String("A B".into())), CellValue::text("A B"));
    }

    #[test]
    fn test_dates_read_as_text() {
        let date = ExcelDateTime::new(45413.0, ExcelDateTimeType::DateTime, false);
        assert_eq!(cell_value(&Data::DateTime(date)), CellValue::text("2024-05-01 00:00:00"));

        let noon = ExcelDateTime::new(45413.5, ExcelDateTimeType::DateTime, false);
        assert_eq!(cell_value(&Data::DateTime(noon)), CellValue::text("2024-05-01 12:00:00"));

        let duration = ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false);
        assert_eq!(cell_value(&Data::DateTime(duration)), CellValue::number(1.5));
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        let plan = ExportPlan {
            sheets: vec![OutputSheet {
                name: "Labels".to_string(),
                source: "wb".to_string(),
                sheet: "Labels".to_string(),
                rows: vec!["A".to_string(), "A".to_string(), "B".to_string()],
            }],
            ..Default::default()
        };
        assert_eq!(write_plan(&plan, &path).unwrap(), 3);

        let source = read_source(&path).unwrap();
        assert_eq!(source.name, "out");
        assert_eq!(source.sheets.len(), 1);
        assert_eq!(source.sheets[0].name, "Labels");
        let rows = &source.sheets[0].rows;
        assert_eq!(rows[0], vec![CellValue::text("Value"), CellValue::text("Quantity")]);
        assert_eq!(rows[1][0], CellValue::text("A"));
        assert_eq!(rows[3][0], CellValue::text("B"));
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let dir = tempdir().unwrap();
        let err = read_source(&dir.path().join("missing.xlsx")).unwrap_err();
        assert!(matches!(err, ImportError::Open { .. }));
    }
}

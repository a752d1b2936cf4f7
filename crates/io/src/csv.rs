// CSV/TSV sources: a single sheet named after the file stem

use std::cmp::Reverse;
use std::io::Read;
use std::path::Path;

use pscxl_engine::cell::CellValue;
use pscxl_engine::sheet::{SheetData, SourceData};

use crate::error::ImportError;
use crate::ingest::source_name;

pub fn read_source(path: &Path) -> Result<SourceData, ImportError> {
    let content = read_file_as_utf8(path)?;
    let is_tsv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tsv"));
    let delimiter = if is_tsv { b'\t' } else { sniff_delimiter(&content) };

    let rows = parse_rows(&content, delimiter).map_err(|source| ImportError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let sheet_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Sheet1".to_string());

    Ok(SourceData {
        name: source_name(path),
        sheets: vec![SheetData::new(sheet_name, rows)],
    })
}

/// Lines looked at when guessing the delimiter.
const SNIFF_LINES: usize = 10;

/// Guess the delimiter from the first lines: the candidate whose first record has
/// more than one field and whose records most often agree with it wins, earlier
/// candidates first on ties. Single-column files fall back to a comma.
fn sniff_delimiter(content: &str) -> u8 {
    let sample = content.lines().take(SNIFF_LINES).collect::<Vec<_>>().join("\n");

    [b'\t', b';', b',', b'|']
        .into_iter()
        .enumerate()
        .filter_map(|(rank, delim)| {
            let widths: Vec<usize> = csv::ReaderBuilder::new()
                .delimiter(delim)
                .has_headers(false)
                .flexible(true)
                .from_reader(sample.as_bytes())
                .records()
                .map(|record| record.map_or(1, |r| r.len()))
                .collect();
            let first = *widths.first()?;
            if first < 2 {
                return None;
            }
            let agreeing = widths.iter().filter(|&&w| w == first).count();
            Some((agreeing * first, Reverse(rank), delim))
        })
        .max()
        .map_or(b',', |(_, _, delim)| delim)
}

/// Read file and convert to UTF-8 if needed (Windows-1252 fallback for Excel-exported CSVs)
fn read_file_as_utf8(path: &Path) -> Result<String, ImportError> {
    let io_err = |source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn parse_rows(content: &str, delimiter: u8) -> Result<Vec<Vec<CellValue>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(CellValue::from_field).collect());
    }
    Ok(rows)
}

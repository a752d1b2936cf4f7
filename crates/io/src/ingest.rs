// Ingestion: source file -> per-sheet duplicate counts -> record store

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use pscxl_engine::aggregate::{aggregate, duplicates, sorted_counts};
use pscxl_engine::cell::CellValue;
use pscxl_engine::record::{normalize, Record, ReingestPolicy};
use pscxl_engine::sheet::SourceData;

use crate::error::ImportError;
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    pub policy: ReingestPolicy,
    /// Rows at the top of every sheet left out of the counts.
    pub skip_header_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    /// Distinct values stored for the sheet.
    pub values: usize,
    /// Occurrences across all stored values.
    pub occurrences: u64,
    pub stacked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResult {
    pub source: String,
    pub policy: ReingestPolicy,
    pub sheets: Vec<SheetSummary>,
    pub cleared: usize,
    pub inserted: usize,
    pub skipped: usize,
}

impl IngestResult {
    /// Short human-readable summary, e.g. "24-0005E2: 2 sheets · 14 values · 3 kept"
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!(
                "{} sheet{}",
                self.sheets.len(),
                if self.sheets.len() == 1 { "" } else { "s" }
            ),
            format!("{} values", self.inserted),
        ];
        if self.skipped > 0 {
            parts.push(format!("{} kept", self.skipped));
        }
        if self.cleared > 0 {
            parts.push(format!("{} replaced", self.cleared));
        }
        format!("{}: {}", self.source, parts.join(" · "))
    }
}

/// Counts for one sheet, most frequent first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetCounts {
    pub sheet: String,
    pub counts: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: CellValue,
    pub count: u32,
}

/// Source name of a file: its base name up to the first `.`
/// (`/data/24-0005E2.xlsx` -> `24-0005E2`).
pub fn source_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split('.').next() {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(file_name),
    }
}

/// Read `path`, count each sheet and store the counts under the file's source name.
///
/// The whole file is read before the store is touched: a source that cannot be read
/// stores nothing.
pub fn ingest(
    store: &mut RecordStore,
    path: &Path,
    options: &IngestOptions,
) -> Result<IngestResult, ImportError> {
    let source = crate::read_source(path)?;
    ingest_source(store, source, options)
}

/// Store counts for an already-read source.
pub fn ingest_source(
    store: &mut RecordStore,
    source: SourceData,
    options: &IngestOptions,
) -> Result<IngestResult, ImportError> {
    let mut per_sheet: Vec<(String, Vec<Record>)> = Vec::with_capacity(source.sheets.len());
    let mut summaries = Vec::with_capacity(source.sheets.len());

    for sheet in source.sheets {
        let sheet = sheet.without_header(options.skip_header_rows);
        let records = normalize(&aggregate(&sheet.rows));

        if records.is_empty() {
            warn!(source = %source.name, sheet = %sheet.name, "sheet has no values");
        }

        summaries.push(SheetSummary {
            sheet: sheet.name.clone(),
            values: records.len(),
            occurrences: records.iter().map(|r| r.quantity as u64).sum(),
            stacked: records.iter().filter(|r| r.stacked).count(),
        });
        per_sheet.push((sheet.name, records));
    }

    let outcome = match options.policy {
        ReingestPolicy::Replace => store.replace_source(&source.name, &per_sheet)?,
        ReingestPolicy::KeepExisting => store.insert_all(&source.name, &per_sheet)?,
    };

    let result = IngestResult {
        source: source.name,
        policy: options.policy,
        sheets: summaries,
        cleared: outcome.cleared,
        inserted: outcome.inserted,
        skipped: outcome.skipped,
    };
    info!(
        source = %result.source,
        policy = ?result.policy,
        sheets = result.sheets.len(),
        inserted = result.inserted,
        skipped = result.skipped,
        cleared = result.cleared,
        "ingested source"
    );
    Ok(result)
}

/// Count values per sheet without storing anything, keeping values seen at least
/// `min_count` times.
pub fn scan(
    path: &Path,
    skip_header_rows: usize,
    min_count: u32,
) -> Result<Vec<SheetCounts>, ImportError> {
    let source = crate::read_source(path)?;
    let mut result = Vec::with_capacity(source.sheets.len());

    for sheet in source.sheets {
        let sheet = sheet.without_header(skip_header_rows);
        let counts = duplicates(&aggregate(&sheet.rows), min_count);
        let counts = sorted_counts(&counts)
            .into_iter()
            .map(|(value, count)| ValueCount {
                value: value.clone(),
                count,
            })
            .collect();
        result.push(SheetCounts {
            sheet: sheet.name,
            counts,
        });
    }
    Ok(result)
}

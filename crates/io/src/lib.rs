// File I/O operations

pub mod csv;
pub mod error;
pub mod export;
pub mod ingest;
pub mod store;
pub mod xlsx;

pub use error::{ExportError, ImportError, StorageError};
pub use export::{export, ExportJob, ExportOptions, ExportResult};
pub use ingest::{ingest, scan, source_name, IngestOptions, IngestResult};
pub use store::RecordStore;

use std::path::Path;

use pscxl_engine::sheet::SourceData;

/// Read every sheet of a source file, picking the reader from the file extension.
pub fn read_source(path: &Path) -> Result<SourceData, ImportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => xlsx::read_source(path),
        "csv" | "tsv" | "txt" => csv::read_source(path),
        _ => Err(ImportError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: ext,
        }),
    }
}

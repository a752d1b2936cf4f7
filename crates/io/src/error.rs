use std::path::PathBuf;

use thiserror::Error;

/// Faults raised by the record store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record matches the key of an update.
    #[error("no record for value '{value}' in {source_name}/{sheet}")]
    NotFound {
        source_name: String,
        sheet: String,
        value: String,
    },
    /// Quantities are counts of occurrences and must be at least one.
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(u32),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("cannot prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Faults raised while reading or ingesting a source file. Nothing is stored when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported source format '.{extension}' for {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("failed to open spreadsheet {}: {message}", path.display())]
    Open { path: PathBuf, message: String },
    #[error("failed to read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },
    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: ::csv::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Faults raised while building the output workbook. The destination is left in an
/// unspecified state.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("the record store is empty, nothing to export")]
    NothingToExport,
    /// A worksheet holds 1048575 rows below its header.
    #[error("{source_name}/{sheet} expands to {rows} rows, more than the 1048575 a worksheet holds")]
    TooManyRows {
        source_name: String,
        sheet: String,
        rows: u64,
    },
    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to start export worker: {0}")]
    Spawn(std::io::Error),
    #[error("export worker stopped unexpectedly")]
    WorkerPanicked,
}

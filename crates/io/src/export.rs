// Export: record store snapshot -> export plan -> xlsx workbook

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use pscxl_engine::export_plan::{planned_rows, ExportPlan, PlanOptions, MAX_DATA_ROWS};

use crate::error::ExportError;
use crate::store::RecordStore;
use crate::xlsx;

pub type ExportOptions = PlanOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportResult {
    pub destination: PathBuf,
    pub sheets: usize,
    pub rows: usize,
    /// (source sheet, written sheet) pairs written under another name
    pub renamed: Vec<(String, String)>,
    pub overwritten: Vec<String>,
    pub duration_ms: u64,
}

impl ExportResult {
    /// Short human-readable summary, e.g. "3 sheets, 120 rows"
    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} sheet{}, {} row{}",
            self.sheets,
            if self.sheets == 1 { "" } else { "s" },
            self.rows,
            if self.rows == 1 { "" } else { "s" }
        );
        if !self.renamed.is_empty() {
            s.push_str(&format!(", {} renamed", self.renamed.len()));
        }
        if !self.overwritten.is_empty() {
            s.push_str(&format!(", {} overwritten", self.overwritten.len()));
        }
        s
    }
}

/// Export every (source, sheet) grouping in the store to a new workbook at `destination`.
///
/// All-or-nothing from the caller's side: any fault aborts with an error and the
/// destination file is not guaranteed to be valid.
pub fn export(
    store: &RecordStore,
    destination: &Path,
    options: &ExportOptions,
) -> Result<ExportResult, ExportError> {
    let start_time = Instant::now();

    let groups = store.snapshot()?;
    if groups.is_empty() {
        return Err(ExportError::NothingToExport);
    }
    debug!(groups = groups.len(), "snapshot taken");

    // Checked before any row is built
    for group in &groups {
        let rows = planned_rows(&group.records);
        if rows > MAX_DATA_ROWS {
            return Err(ExportError::TooManyRows {
                source_name: group.source.clone(),
                sheet: group.sheet.clone(),
                rows,
            });
        }
    }

    let plan = ExportPlan::build(&groups, options);
    for name in &plan.overwritten {
        warn!(sheet = %name, "sheet name shared by several sources, keeping the last one");
    }

    let rows = xlsx::write_plan(&plan, destination)?;

    let result = ExportResult {
        destination: destination.to_path_buf(),
        sheets: plan.sheets.len(),
        rows,
        renamed: plan.renamed,
        overwritten: plan.overwritten,
        duration_ms: start_time.elapsed().as_millis() as u64,
    };
    info!(destination = %destination.display(), summary = %result.summary(), "export finished");
    Ok(result)
}

/// An export running on a background worker thread.
///
/// The worker opens its own connection to the store file. Nothing else should
/// write to the store until the job is waited on.
pub struct ExportJob {
    destination: PathBuf,
    handle: JoinHandle<Result<ExportResult, ExportError>>,
}

impl ExportJob {
    pub fn spawn(db_path: &Path, destination: &Path, options: ExportOptions) -> Result<Self, ExportError> {
        let db_path = db_path.to_path_buf();
        let target = destination.to_path_buf();
        let handle = thread::Builder::new()
            .name("pscxl-export".to_string())
            .spawn(move || {
                let store = RecordStore::open(&db_path)?;
                export(&store, &target, &options)
            })
            .map_err(ExportError::Spawn)?;

        debug!(destination = %destination.display(), "export worker started");
        Ok(Self {
            destination: destination.to_path_buf(),
            handle,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Block until the worker is done.
    pub fn wait(self) -> Result<ExportResult, ExportError> {
        self.handle.join().map_err(|_| ExportError::WorkerPanicked)?
    }
}

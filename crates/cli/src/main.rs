// pscxl - label data from spreadsheets: ingest, curate, export

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, error, info};

use pscxl_cli::exit_codes::{
    EXIT_ERROR, EXIT_EXPORT, EXIT_INPUT, EXIT_NOT_FOUND, EXIT_STORAGE, EXIT_SUCCESS, EXIT_USAGE,
};
use pscxl_cli::logging;
use pscxl_config::Settings;
use pscxl_engine::cell::CellValue;
use pscxl_engine::export_plan::SheetNaming;
use pscxl_engine::record::{display_value, is_stacked_text, Record, RecordEdit, RecordKey, ReingestPolicy};
use pscxl_io::{
    ingest, scan, ExportError, ExportJob, ExportOptions, ImportError, IngestOptions, RecordStore,
    StorageError,
};

#[derive(Parser)]
#[command(name = "pscxl")]
#[command(about = "Count label values in spreadsheets, curate them, export print sheets")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Record store database (overrides store.path)
    #[arg(long, global = true, env = "PSCXL_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Settings file (defaults to the per-user settings.json)
    #[arg(long, global = true, env = "PSCXL_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count every sheet of one or more spreadsheets and store the counts
    #[command(after_help = "\
Examples:
  pscxl ingest 24-0005E2.xlsx
  pscxl ingest labels/*.xlsx --policy keep-existing
  pscxl ingest export.csv --skip-header 1")]
    Ingest {
        /// Spreadsheet files (xlsx, xlsm, xlsb, xls, ods, csv, tsv)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// What to do with records already stored for the same source
        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Rows at the top of every sheet to leave out
        #[arg(long, value_name = "N")]
        skip_header: Option<usize>,
    },

    /// Show repeated values per sheet without storing anything
    Scan {
        file: PathBuf,

        /// Only show values seen at least this many times
        #[arg(long, default_value_t = 2, value_name = "N")]
        min_count: u32,

        /// Rows at the top of every sheet to leave out
        #[arg(long, value_name = "N")]
        skip_header: Option<usize>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored source names
    Sources,

    /// List stored sheet names of a source
    Sheets { source: String },

    /// List the records of one sheet
    List {
        source: String,
        sheet: String,

        /// Output JSON
        #[arg(long)]
        json: bool,

        /// Show values exactly as stored (no collapsing of stacked spacing)
        #[arg(long)]
        raw: bool,
    },

    /// Add a record unless one with the same value exists
    Add {
        source: String,
        sheet: String,
        value: String,

        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: u32,

        /// Defaults to true when the value contains an interior space
        #[arg(long, value_name = "BOOL")]
        stacked: Option<bool>,
    },

    /// Change the value, quantity or stacked flag of a record
    #[command(after_help = "\
Examples:
  pscxl edit 24-0005E2 Front 'A B' --quantity 5
  pscxl edit 24-0005E2 Front 'A B' --value 'A C' --stacked false")]
    Edit {
        source: String,
        sheet: String,
        value: String,

        /// New value
        #[arg(long = "value", value_name = "NEW")]
        new_value: Option<String>,

        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        quantity: Option<u32>,

        #[arg(long, value_name = "BOOL")]
        stacked: Option<bool>,
    },

    /// Delete one record
    Delete {
        source: String,
        sheet: String,
        value: String,
    },

    /// Delete every record of a source
    Clear { source: String },

    /// Write every stored sheet to a new workbook
    #[command(after_help = "\
Examples:
  pscxl export labels.xlsx
  pscxl export labels.xlsx --naming qualified --spacing 6")]
    Export {
        destination: PathBuf,

        /// How output sheets are named when sources share a sheet name
        #[arg(long)]
        naming: Option<NamingArg>,

        /// Spaces written for each space of a stacked value
        #[arg(long, value_name = "N")]
        spacing: Option<usize>,
    },

    /// Print every table of the record store
    Dump,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Clear the source's records, then store the fresh counts
    Replace,
    /// Keep stored records; only add new values
    #[value(alias = "keep_existing")]
    KeepExisting,
}

impl From<PolicyArg> for ReingestPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Replace => ReingestPolicy::Replace,
            PolicyArg::KeepExisting => ReingestPolicy::KeepExisting,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum NamingArg {
    /// Sheet name, qualified by source only on collisions
    Auto,
    /// Sheet name only; the last source wins on collisions
    Sheet,
    /// Always "<source> - <sheet>"
    Qualified,
}

impl From<NamingArg> for SheetNaming {
    fn from(arg: NamingArg) -> Self {
        match arg {
            NamingArg::Auto => SheetNaming::Auto,
            NamingArg::Sheet => SheetNaming::Sheet,
            NamingArg::Qualified => SheetNaming::Qualified,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("PSCXL_GIT_HASH"), ")",
        "\nengine:  pscxl-engine ", env!("CARGO_PKG_VERSION"),
    )
}

/// Everything a command needs besides its own arguments.
struct Context {
    settings: Settings,
    db_path: PathBuf,
}

impl Context {
    fn open_store(&self) -> Result<RecordStore, CliError> {
        debug!(db = %self.db_path.display(), "opening record store");
        RecordStore::open(&self.db_path).map_err(|e| {
            CliError::from(e).with_hint(format!("record store: {}", self.db_path.display()))
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let _guard = logging::init(&settings.log_settings());

    let ctx = Context {
        db_path: cli.db.clone().unwrap_or_else(|| settings.store_path()),
        settings,
    };

    let result = match cli.command {
        Commands::Ingest {
            files,
            policy,
            skip_header,
        } => cmd_ingest(&ctx, files, policy, skip_header),
        Commands::Scan {
            file,
            min_count,
            skip_header,
            json,
        } => cmd_scan(&ctx, file, min_count, skip_header, json),
        Commands::Sources => cmd_sources(&ctx),
        Commands::Sheets { source } => cmd_sheets(&ctx, source),
        Commands::List {
            source,
            sheet,
            json,
            raw,
        } => cmd_list(&ctx, source, sheet, json, raw),
        Commands::Add {
            source,
            sheet,
            value,
            quantity,
            stacked,
        } => cmd_add(&ctx, source, sheet, value, quantity, stacked),
        Commands::Edit {
            source,
            sheet,
            value,
            new_value,
            quantity,
            stacked,
        } => cmd_edit(&ctx, source, sheet, value, new_value, quantity, stacked),
        Commands::Delete {
            source,
            sheet,
            value,
        } => cmd_delete(&ctx, source, sheet, value),
        Commands::Clear { source } => cmd_clear(&ctx, source),
        Commands::Export {
            destination,
            naming,
            spacing,
        } => cmd_export(&ctx, destination, naming, spacing),
        Commands::Dump => cmd_dump(&ctx),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                error!("{}", message);
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            hint: None,
        }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        let code = match &err {
            StorageError::NotFound { .. } => EXIT_NOT_FOUND,
            StorageError::InvalidQuantity(_) => EXIT_USAGE,
            StorageError::Sqlite(_) | StorageError::Io(_) => EXIT_STORAGE,
        };
        Self::new(code, err.to_string())
    }
}

impl From<ImportError> for CliError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Storage(e) => e.into(),
            ImportError::UnsupportedFormat { .. } => Self::new(EXIT_INPUT, err.to_string())
                .with_hint("supported: xlsx, xlsm, xlsb, xls, ods, csv, tsv"),
            other => Self::new(EXIT_INPUT, other.to_string()),
        }
    }
}

impl From<ExportError> for CliError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Storage(e) => e.into(),
            ExportError::NothingToExport => {
                Self::new(EXIT_EXPORT, err.to_string()).with_hint("run `pscxl ingest <FILE>` first")
            }
            other => Self::new(EXIT_EXPORT, other.to_string()),
        }
    }
}

fn write_err(e: io::Error) -> CliError {
    CliError::io(e.to_string())
}

// ============================================================================
// ingest / scan
// ============================================================================

fn cmd_ingest(
    ctx: &Context,
    files: Vec<PathBuf>,
    policy: Option<PolicyArg>,
    skip_header: Option<usize>,
) -> Result<(), CliError> {
    let options = IngestOptions {
        policy: policy.map(Into::into).unwrap_or(ctx.settings.ingest_policy),
        skip_header_rows: skip_header.unwrap_or(ctx.settings.skip_header_rows),
    };
    let mut store = ctx.open_store()?;

    let mut failed: Vec<CliError> = Vec::new();
    for file in &files {
        info!(file = %file.display(), "Loading workbook");
        match ingest(&mut store, file, &options) {
            Ok(result) => println!("{}", result.summary()),
            Err(e) => {
                let err = CliError::from(e);
                error!(file = %file.display(), "{}", err.message);
                eprintln!("error: {}: {}", file.display(), err.message);
                failed.push(err);
            }
        }
    }

    match failed.len() {
        0 => Ok(()),
        // A single failure keeps its own exit code
        1 if files.len() == 1 => {
            let err = failed.remove(0);
            Err(CliError {
                message: String::new(),
                ..err
            })
        }
        n => {
            let code = failed.iter().map(|e| e.code).max().unwrap_or(EXIT_ERROR);
            Err(CliError::new(
                code,
                format!("{} of {} files could not be ingested", n, files.len()),
            ))
        }
    }
}

fn cmd_scan(
    ctx: &Context,
    file: PathBuf,
    min_count: u32,
    skip_header: Option<usize>,
    json: bool,
) -> Result<(), CliError> {
    let skip = skip_header.unwrap_or(ctx.settings.skip_header_rows);
    let sheets = scan(&file, skip, min_count)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        let text = serde_json::to_string_pretty(&sheets).map_err(|e| CliError::io(e.to_string()))?;
        writeln!(out, "{}", text).map_err(write_err)?;
        return Ok(());
    }

    for sheet in &sheets {
        writeln!(out, "Sheet: {}", sheet.sheet).map_err(write_err)?;
        for entry in &sheet.counts {
            let value = match &entry.value {
                CellValue::Text(s) => s.clone(),
                other => other.to_string(),
            };
            writeln!(out, "{:>6}  {}", entry.count, value).map_err(write_err)?;
        }
    }
    Ok(())
}

// ============================================================================
// browse
// ============================================================================

fn cmd_sources(ctx: &Context) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in store.list_sources()? {
        writeln!(out, "{}", name).map_err(write_err)?;
    }
    Ok(())
}

fn cmd_sheets(ctx: &Context, source: String) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let sheets = store.list_sheets(&source)?;
    if sheets.is_empty() {
        return Err(CliError::new(
            EXIT_NOT_FOUND,
            format!("no sheets stored for source '{}'", source),
        )
        .with_hint("`pscxl sources` lists stored sources"));
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in sheets {
        writeln!(out, "{}", name).map_err(write_err)?;
    }
    Ok(())
}

fn cmd_list(ctx: &Context, source: String, sheet: String, json: bool, raw: bool) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let records: Vec<Record> = store
        .list_records(&source, &sheet)?
        .into_iter()
        .map(|r| if raw { r } else { Record { value: display_value(&r.value), ..r } })
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        let text = serde_json::to_string_pretty(&records).map_err(|e| CliError::io(e.to_string()))?;
        writeln!(out, "{}", text).map_err(write_err)?;
        return Ok(());
    }

    writeln!(out, "Value\tQuantity\tStacked").map_err(write_err)?;
    for record in &records {
        writeln!(
            out,
            "{}\t{}\t{}",
            record.value,
            record.quantity,
            if record.stacked { "yes" } else { "no" }
        )
        .map_err(write_err)?;
    }
    Ok(())
}

fn cmd_dump(ctx: &Context) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    store.dump(&mut out)?;
    Ok(())
}

// ============================================================================
// edit
// ============================================================================

fn cmd_add(
    ctx: &Context,
    source: String,
    sheet: String,
    value: String,
    quantity: u32,
    stacked: Option<bool>,
) -> Result<(), CliError> {
    // Stored values are trimmed, as on ingest
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(CliError::args("value must not be blank"));
    }
    let store = ctx.open_store()?;
    let stacked = stacked.unwrap_or_else(|| is_stacked_text(&value));

    if store.insert_if_absent(&source, &sheet, &value, quantity, stacked)? {
        info!(source = %source, sheet = %sheet, value = %value, quantity, stacked, "record added");
        println!("added '{}' to {}/{}", value, source, sheet);
    } else {
        println!("'{}' already stored in {}/{}, left unchanged", value, source, sheet);
    }
    Ok(())
}

fn cmd_edit(
    ctx: &Context,
    source: String,
    sheet: String,
    value: String,
    new_value: Option<String>,
    quantity: Option<u32>,
    stacked: Option<bool>,
) -> Result<(), CliError> {
    let edit = RecordEdit {
        value: new_value.map(|v| v.trim().to_string()),
        quantity,
        stacked,
    };
    if edit.is_noop() {
        return Err(CliError::args("nothing to change")
            .with_hint("pass at least one of --value, --quantity, --stacked"));
    }
    if edit.value.as_deref().is_some_and(str::is_empty) {
        return Err(CliError::args("value must not be blank"));
    }

    let store = ctx.open_store()?;
    let key = RecordKey::new(source, sheet, value);
    let updated = store.edit(&key, &edit)?;
    info!(
        source = %key.source,
        sheet = %key.sheet,
        from = %key.value,
        to = %updated.value,
        quantity = updated.quantity,
        stacked = updated.stacked,
        "record updated"
    );
    println!(
        "{}/{}: '{}' quantity {}{}",
        key.source,
        key.sheet,
        updated.value,
        updated.quantity,
        if updated.stacked { " (stacked)" } else { "" }
    );
    Ok(())
}

fn cmd_delete(ctx: &Context, source: String, sheet: String, value: String) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let key = RecordKey::new(source, sheet, value);
    if !store.delete(&key)? {
        return Err(StorageError::NotFound {
            source_name: key.source,
            sheet: key.sheet,
            value: key.value,
        }
        .into());
    }
    info!(source = %key.source, sheet = %key.sheet, value = %key.value, "record deleted");
    println!("deleted '{}' from {}/{}", key.value, key.source, key.sheet);
    Ok(())
}

fn cmd_clear(ctx: &Context, source: String) -> Result<(), CliError> {
    let store = ctx.open_store()?;
    let removed = store.clear_source(&source)?;
    info!(source = %source, removed, "source cleared");
    println!("cleared {} record{} of {}", removed, if removed == 1 { "" } else { "s" }, source);
    Ok(())
}

// ============================================================================
// export
// ============================================================================

fn cmd_export(
    ctx: &Context,
    destination: PathBuf,
    naming: Option<NamingArg>,
    spacing: Option<usize>,
) -> Result<(), CliError> {
    let mut options: ExportOptions = ctx.settings.plan_options();
    if let Some(naming) = naming {
        options.naming = naming.into();
    }
    if let Some(spacing) = spacing {
        options.stack_spacing = spacing;
    }
    if options.stack_spacing == 0 {
        return Err(CliError::args("--spacing must be at least 1"));
    }

    // Create the store up front so a bad location reports as a storage fault
    drop(ctx.open_store()?);

    let job = ExportJob::spawn(&ctx.db_path, &destination, options)?;
    eprintln!("exporting to {}...", display_path(job.destination()));
    let result = job.wait()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "exported {} to {}", result.summary(), display_path(&result.destination))
        .map_err(write_err)?;
    for (from, to) in &result.renamed {
        writeln!(out, "  {} -> {}", from, to).map_err(write_err)?;
    }
    for name in &result.overwritten {
        writeln!(out, "  {} overwritten by a later source", name).map_err(write_err)?;
    }
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

//! Log file setup.
//!
//! Every line is written as `<timestamp> - <LEVEL> - <message>` so `read_logs`
//! can filter it by level.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use chrono::Local;
use pscxl_config::LogSettings;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable overriding the configured filter, e.g. `PSCXL_LOG=info`.
pub const LOG_ENV: &str = "PSCXL_LOG";

/// `2024-05-01 12:00:00,123`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Event formatter producing `<timestamp> - <LEVEL> - <message>` lines.
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format(TIMESTAMP_FORMAT),
            level_name(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Level names as they appear in the log file.
pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE | Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

/// Translate a configured level into a filter directive. Accepts the log file
/// spellings too (`WARNING`, `CRITICAL`).
pub fn filter_directive(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        other => other.to_string(),
    }
}

/// Open the log file, creating its directory. Truncates unless `append`.
pub fn open_log_file(path: &Path, append: bool) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path)
}

/// Install the global subscriber writing to the configured log file.
///
/// Returns a WorkerGuard that must be held until exit so buffered lines are
/// flushed. Returns `None` when the log file cannot be opened or a subscriber is
/// already installed; the program runs on without a log file.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let file = match open_log_file(&settings.file, settings.append) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "warning: cannot open log file {}: {}",
                settings.file.display(),
                e
            );
            return None;
        }
    };

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::try_new(filter_directive(&settings.level)).unwrap_or_else(|e| {
            eprintln!("warning: invalid log.level '{}': {}", settings.level, e);
            EnvFilter::new("debug")
        })
    });

    let (writer, guard) = tracing_appender::non_blocking(file);
    let layer = fmt::layer()
        .event_format(LineFormat)
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(env_filter);

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        return None;
    }
    Some(guard)
}

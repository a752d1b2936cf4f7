// read_logs - print a pscxl log file, optionally filtered by level

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pscxl_cli::exit_codes::{EXIT_INPUT, EXIT_SUCCESS, EXIT_USAGE};
use pscxl_cli::logs::{print_log, LogLevel};

#[derive(Parser)]
#[command(name = "read_logs")]
#[command(about = "Parse and print log file.")]
#[command(version)]
struct Args {
    /// Path to the log file
    file_path: PathBuf,

    /// Filter logs by level (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(short = 'l', long = "log_level", visible_alias = "log-level")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // An empty level means no filter
    let level = match args.log_level.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<LogLevel>() {
            Ok(level) => Some(level),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(EXIT_USAGE);
            }
        },
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match print_log(&args.file_path, level, &mut handle) {
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("error: cannot read {}: {}", args.file_path.display(), e);
            ExitCode::from(EXIT_INPUT)
        }
    }
}

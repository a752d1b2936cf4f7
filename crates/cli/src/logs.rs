//! Log file reading for `read_logs`.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Does `line` carry this level (` - LEVEL - `)?
    pub fn matches(&self, line: &str) -> bool {
        line.contains(&format!(" - {} - ", self.as_str()))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A level name that is none of DEBUG, INFO, WARNING, ERROR, CRITICAL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLogLevel(pub String);

impl fmt::Display for InvalidLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<&str> = LogLevel::ALL.iter().map(|l| l.as_str()).collect();
        write!(
            f,
            "Invalid log level: {}. Valid levels are: {}",
            self.0,
            valid.join(", ")
        )
    }
}

impl std::error::Error for InvalidLogLevel {}

impl FromStr for LogLevel {
    type Err = InvalidLogLevel;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == upper)
            .ok_or_else(|| InvalidLogLevel(s.to_string()))
    }
}

/// Stream the log at `path` to `out`, one trimmed line at a time. Returns the
/// number of lines written.
pub fn print_log(path: &Path, level: Option<LogLevel>, out: &mut impl Write) -> io::Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut printed = 0;

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if level.map_or(true, |l| l.matches(line)) {
            writeln!(out, "{}", line)?;
            printed += 1;
        }
    }
    Ok(printed)
}

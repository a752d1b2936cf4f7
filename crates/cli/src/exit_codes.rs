//! CLI Exit Code Registry
//!
//! This is the single source of truth for the exit codes of `pscxl` and
//! `read_logs`. Scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (unspecified)                      |
//! | 2    | Usage error (bad args, invalid log level)        |
//! | 3    | Input fault (unreadable or unsupported source)   |
//! | 4    | Storage fault (database unavailable, constraint) |
//! | 5    | No record matches the given key                  |
//! | 6    | Export fault                                     |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// Matches the code clap uses for argument errors.
pub const EXIT_USAGE: u8 = 2;

/// A source file (or log file) could not be read or parsed.
pub const EXIT_INPUT: u8 = 3;

/// The record store rejected or failed an operation.
pub const EXIT_STORAGE: u8 = 4;

/// Edit or delete addressed a record that does not exist.
pub const EXIT_NOT_FOUND: u8 = 5;

/// The output workbook could not be produced.
pub const EXIT_EXPORT: u8 = 6;

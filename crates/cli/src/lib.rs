// Shared pieces of the pscxl and read_logs binaries

pub mod exit_codes;
pub mod logging;
pub mod logs;

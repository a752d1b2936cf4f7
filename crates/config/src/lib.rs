// Configuration loading

pub mod settings;

pub use settings::{LogSettings, Settings};

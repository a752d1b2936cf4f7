// Application settings
// Loaded from ~/.config/pscxl/settings.json

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use pscxl_engine::export_plan::{PlanOptions, SheetNaming};
use pscxl_engine::record::{ReingestPolicy, DEFAULT_STACK_SPACING};

const APP_DIR: &str = "pscxl";

/// Where and how the log file is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub file: PathBuf,
    /// Minimum level: trace, debug, info, warn or error
    pub level: String,
    /// Keep lines from previous runs instead of truncating
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Record store
    #[serde(rename = "store.path")]
    pub store_path: Option<PathBuf>, // None = <data_dir>/pscxl/pscxl.db

    // Logging
    #[serde(rename = "log.file")]
    pub log_file: Option<PathBuf>, // None = <data_dir>/pscxl/pscxl_log.txt

    #[serde(rename = "log.level")]
    pub log_level: String,

    #[serde(rename = "log.append")]
    pub log_append: bool,

    // Ingestion
    #[serde(rename = "ingest.policy")]
    pub ingest_policy: ReingestPolicy,

    #[serde(rename = "ingest.skipHeaderRows")]
    pub skip_header_rows: usize,

    // Export
    #[serde(rename = "export.sheetNaming")]
    pub sheet_naming: SheetNaming,

    #[serde(rename = "export.stackSpacing")]
    pub stack_spacing: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            log_file: None,
            log_level: "debug".to_string(),
            log_append: false,
            ingest_policy: ReingestPolicy::Replace,
            skip_header_rows: 0,
            sheet_naming: SheetNaming::Auto,
            stack_spacing: DEFAULT_STACK_SPACING,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        config_dir.join("settings.json")
    }

    /// Directory holding the store and the log file unless configured otherwise
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Load settings from the default location, writing a commented default
    /// file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            if let Err(e) = Self::create_default_file(&path) {
                eprintln!("Error writing default settings.json: {}", e);
            }
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load settings from `path`, falling back to defaults.
    ///
    /// A missing file is not an error and nothing is created.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", path.display(), e);
                    eprintln!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring lines that start with `//`.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("pscxl.db"))
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            file: self
                .log_file
                .clone()
                .unwrap_or_else(|| Self::data_dir().join("pscxl_log.txt")),
            level: self.log_level.clone(),
            append: self.log_append,
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            naming: self.sheet_naming,
            stack_spacing: self.stack_spacing,
        }
    }

    /// Create default settings file with comments
    fn create_default_file(path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let default_config = r#"{
    // Record store (null = pscxl.db in the data directory)
    "store.path": null,

    // Logging (null = pscxl_log.txt in the data directory)
    // Levels: "trace", "debug", "info", "warn", "error"
    "log.file": null,
    "log.level": "debug",
    "log.append": false,

    // Ingestion
    // Policy options: "replace" (clear the source first), "keep_existing"
    "ingest.policy": "replace",
    "ingest.skipHeaderRows": 0,

    // Export
    // Sheet naming options: "auto", "sheet", "qualified"
    "export.sheetNaming": "auto",
    "export.stackSpacing": 10
}
"#;

        fs::write(path, default_config).map_err(|e| e.to_string())
    }
}

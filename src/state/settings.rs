//! Application settings with persistence.

use serde::{Deserialize, Serialize};

use crate::connection::{Encoding, JsonTransferFormat};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub browse: BrowseSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
}

/// Result paging defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowseSettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    #[serde(default)]
    pub unpaged: bool,
}

impl Default for BrowseSettings {
    fn default() -> Self {
        Self { default_page_size: default_page_size(), unpaged: false }
    }
}

/// Transfer (import/export) default settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub export_format: JsonTransferFormat,
    #[serde(default = "default_filename_template")]
    pub export_filename_template: String,
    #[serde(default)]
    pub default_export_folder: String,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            encoding: Encoding::default(),
            export_format: JsonTransferFormat::default(),
            export_filename_template: default_filename_template(),
            default_export_folder: String::new(),
        }
    }
}

/// Where and how to reach the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionSettings {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self { uri: default_uri(), connect_timeout_secs: default_connect_timeout_secs() }
    }
}

fn default_page_size() -> i64 {
    10
}

fn default_batch_size() -> usize {
    1000
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_filename_template() -> String {
    DEFAULT_FILENAME_TEMPLATE.to_string()
}

/// Default filename template constant
pub const DEFAULT_FILENAME_TEMPLATE: &str = "${database}_${collection}_${datetime}";

/// Available filename template placeholders
pub const FILENAME_PLACEHOLDERS: &[(&str, &str)] = &[
    ("${datetime}", "Date and time (2026-01-30_20-15-30)"),
    ("${date}", "Date only (2026-01-30)"),
    ("${time}", "Time only (20-15-30)"),
    ("${database}", "Database name"),
    ("${collection}", "Collection name"),
];

/// Expand filename template placeholders
pub fn expand_filename_template(template: &str, database: &str, collection: &str) -> String {
    let now = chrono::Local::now();

    template
        .replace("${datetime}", &now.format("%Y-%m-%d_%H-%M-%S").to_string())
        .replace("${date}", &now.format("%Y-%m-%d").to_string())
        .replace("${time}", &now.format("%H-%M-%S").to_string())
        .replace("${database}", database)
        .replace("${collection}", collection)
}

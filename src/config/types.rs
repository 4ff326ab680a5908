use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration container.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how often state is mirrored to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Storage directory. Defaults to `<data_local_dir>/teamhub/storage`.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Quiet period before a change is written (default: 300).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG` (default: "info").
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            directory: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

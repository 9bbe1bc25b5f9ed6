use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings from crossloop.yaml
///
/// Every section falls back to its defaults, so a partial file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub runtime: RuntimeSettings,
    pub progress: ProgressSettings,
}

/// Log file location and verbosity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory for the daily log files
    pub directory: String,

    /// Log file name prefix
    pub file_prefix: String,

    /// Log at debug level instead of info
    pub debug_mode: bool,

    /// Also log to the console
    pub console_output: bool,

    /// Write the log file as JSON lines
    pub json_output: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "crossloop".to_string(),
            debug_mode: false,
            console_output: true,
            json_output: false,
        }
    }
}

/// Tokio runtime used for background operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub worker_threads: usize,
    pub thread_name: String,
    pub shutdown_timeout_secs: u64,
}

impl RuntimeSettings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            thread_name: "crossloop-worker".to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

/// Presentation hints for progress indicators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    pub show_pause_button: bool,
    pub show_cancel_button: bool,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            show_pause_button: true,
            show_cancel_button: true,
        }
    }
}

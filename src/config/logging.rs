use serde::{Deserialize, Serialize};

use super::defaults::{default_log_format, default_log_level};

/// Logging configuration. Only stdout formatting is configurable; there
/// is no file-rotation option.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// "json" or "text".
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Passed to `tracing_subscriber::EnvFilter` when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

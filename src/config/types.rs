use serde::{Deserialize, Serialize};

use super::defaults::default_port;
use super::logging::LoggingConfig;
use super::server::ServerConfig;

/// Root configuration, aggregating per-concern sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_code_length, default_countdown_seconds, default_max_players,
    default_post_game_grace_seconds, default_queue_eta_seconds,
};

/// Tunables for the lobby coordinator core. Every field has an
/// environment variable override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_countdown_seconds")]
    pub countdown_seconds: u64,
    #[serde(default = "default_post_game_grace_seconds")]
    pub post_game_grace_seconds: u64,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_max_players")]
    pub max_players: u8,
    #[serde(default = "default_queue_eta_seconds")]
    pub queue_eta_seconds: u64,
    /// Opaque connection string for an optional persistence mirror. Passed
    /// through without interpretation by the core.
    #[serde(default)]
    pub persistence_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: default_countdown_seconds(),
            post_game_grace_seconds: default_post_game_grace_seconds(),
            code_length: default_code_length(),
            max_players: default_max_players(),
            queue_eta_seconds: default_queue_eta_seconds(),
            persistence_url: None,
        }
    }
}

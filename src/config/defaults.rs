//! Default value functions used by `#[serde(default = "...")]` across the
//! config structs, grouped by the config section they belong to.

pub fn default_port() -> u16 {
    8080
}

pub fn default_countdown_seconds() -> u64 {
    3
}

pub fn default_post_game_grace_seconds() -> u64 {
    2
}

pub fn default_code_length() -> usize {
    4
}

pub fn default_max_players() -> u8 {
    2
}

pub fn default_queue_eta_seconds() -> u64 {
    30
}

pub fn default_log_format() -> String {
    "text".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

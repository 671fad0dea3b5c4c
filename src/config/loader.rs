use std::path::PathBuf;

use super::types::Config;

/// Loads configuration in layered precedence, flat environment variables
/// taking priority over file contents:
///
/// 1. compiled-in defaults
/// 2. `config.json` in the current working directory, if present
/// 3. `config.json` next to the running executable, if present
/// 4. individual environment variable overrides
///
/// Parse failures at any JSON step are logged and the step is skipped
/// rather than propagated; a malformed `config.json` never prevents
/// startup.
pub fn load() -> Config {
    let mut config = Config::default();

    if let Some(from_cwd) = read_json_file(&PathBuf::from("config.json")) {
        merge_file(&mut config, from_cwd);
    } else if let Some(exe_path) = exe_dir_config_path() {
        if let Some(from_exe_dir) = read_json_file(&exe_path) {
            merge_file(&mut config, from_exe_dir);
        }
    }

    apply_env_overrides(&mut config);
    config
}

fn exe_dir_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|dir| dir.join("config.json")))
}

fn read_json_file(path: &PathBuf) -> Option<Config> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Config>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring malformed config.json");
            None
        }
    }
}

fn merge_file(config: &mut Config, from_file: Config) {
    *config = from_file;
}

fn apply_env_overrides(config: &mut Config) {
    if let Some(v) = env_u16("PORT") {
        config.port = v;
    }
    if let Some(v) = env_u64("COUNTDOWN_SECONDS") {
        config.server.countdown_seconds = v;
    }
    if let Some(v) = env_u64("POST_GAME_GRACE_SECONDS") {
        config.server.post_game_grace_seconds = v;
    }
    if let Some(v) = env_usize("CODE_LENGTH") {
        config.server.code_length = v;
    }
    if let Some(v) = env_u8("MAX_PLAYERS") {
        config.server.max_players = v;
    }
    if let Some(v) = env_u64("QUEUE_ETA_SECONDS") {
        config.server.queue_eta_seconds = v;
    }
    if let Ok(v) = std::env::var("PERSISTENCE_URL") {
        config.server.persistence_url = Some(v);
    }
    if let Ok(v) = std::env::var("LOG_FORMAT") {
        config.logging.format = v;
    }
    if let Ok(v) = std::env::var("LOG_LEVEL") {
        config.logging.level = v;
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(name, raw, "ignoring unparseable env override");
                None
            }
        },
        Err(_) => None,
    }
}

fn env_u16(name: &str) -> Option<u16> {
    env_parsed(name)
}
fn env_u64(name: &str) -> Option<u64> {
    env_parsed(name)
}
fn env_u8(name: &str) -> Option<u8> {
    env_parsed(name)
}
fn env_usize(name: &str) -> Option<usize> {
    env_parsed(name)
}

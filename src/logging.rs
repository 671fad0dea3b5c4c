//! Structured logging bootstrap: JSON or text formatting, selected by
//! config, with `RUST_LOG` able to override the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the global `tracing` subscriber from the loaded config.
/// `RUST_LOG` takes precedence over `config.level` when set.
pub fn init_with_config(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    match config.format.as_str() {
        "json" => init_json_logging(env_filter),
        _ => init_text_logging(env_filter),
    }
}

fn init_json_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

fn init_text_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

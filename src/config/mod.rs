mod defaults;
mod loader;
mod logging;
mod server;
mod types;

pub use loader::load;
pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use types::Config;

//! HTTP + WebSocket surface and the shared application state it runs on.

pub mod handlers;
pub mod ws;

use std::sync::Arc;

use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::connection_hub::ConnectionHub;
use crate::matchmaking::MatchmakingQueue;
use crate::registry::event_sink::TracingEventSink;
use crate::registry::persistence::NoopPersistence;
use crate::registry::player_directory::EchoPlayerDirectory;
use crate::registry::{EventSink, LobbyRegistry, PlayerDirectory};

/// Shared application state. Its members are already cheap to clone, so
/// this is built once in `main.rs` and handed to axum as `State`.
#[derive(Clone)]
pub struct AppState {
    pub registry: LobbyRegistry,
    pub queue: Arc<MatchmakingQueue>,
    pub hub: Arc<ConnectionHub>,
}

impl AppState {
    pub fn new(config: &crate::config::ServerConfig) -> Self {
        let broadcaster = Arc::new(Broadcaster::new());
        let event_sink: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        let player_directory: Arc<dyn PlayerDirectory> = Arc::new(EchoPlayerDirectory);
        let persistence = Arc::new(NoopPersistence);

        let registry = LobbyRegistry::new(
            config,
            broadcaster.clone(),
            event_sink.clone(),
            player_directory,
            persistence,
        );
        let queue = Arc::new(MatchmakingQueue::new(
            registry.clone(),
            event_sink,
            config.queue_eta_seconds,
        ));
        registry.wire_matchmaking_queue(queue.clone());
        let hub = Arc::new(ConnectionHub::new(registry.clone(), broadcaster));

        Self { registry, queue, hub }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.server)
    }
}

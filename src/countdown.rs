//! The cancellable pre-game countdown: a spawned task that ticks once a
//! second, guarded by a generation counter so a cancellation during the
//! countdown invalidates any ticks already in flight.

use std::time::Duration;

use crate::protocol::LobbyId;
use crate::registry::LobbyRegistry;

/// Runs one countdown instance to completion or until it is invalidated by
/// a generation bump (any `leave`/`set_ready(false)` during the countdown
/// calls `Lobby::cancel_countdown`, which bumps the generation this task
/// was spawned with). `countdown_started` is published by the caller
/// (`LobbyRegistry::set_ready`) in the same critical section that decided
/// to start the timer; this task owns only the ticking and the terminal
/// transition.
pub async fn run(
    registry: LobbyRegistry,
    lobby_id: LobbyId,
    generation: u64,
    duration_secs: u64,
    grace_secs: u64,
) {
    for remaining in (0..duration_secs).rev() {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if !registry.tick_if_current(lobby_id, generation, remaining).await {
            return;
        }
    }

    let Some(snapshot) = registry.complete_countdown(lobby_id, generation).await else {
        return;
    };

    registry.announce_game_started(lobby_id, &snapshot).await;

    tokio::time::sleep(Duration::from_secs(grace_secs)).await;
    registry.delete_finalized_lobby(lobby_id).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::config::ServerConfig;
    use crate::protocol::LobbyStatus;
    use crate::registry::event_sink::TracingEventSink;
    use crate::registry::persistence::NoopPersistence;
    use crate::registry::player_directory::EchoPlayerDirectory;

    fn registry() -> LobbyRegistry {
        let config = ServerConfig {
            countdown_seconds: 1,
            post_game_grace_seconds: 1,
            code_length: 4,
            max_players: 2,
            queue_eta_seconds: 30,
            persistence_url: None,
        };
        LobbyRegistry::new(
            &config,
            Arc::new(Broadcaster::new()),
            Arc::new(TracingEventSink),
            Arc::new(EchoPlayerDirectory),
            Arc::new(NoopPersistence),
        )
    }

    #[tokio::test]
    async fn countdown_runs_to_completion() {
        let registry = registry();
        let lobby = registry.create("a".into()).await.unwrap();
        registry.join("b".into(), &lobby.code).await.unwrap();
        registry.set_ready("a", true).await.unwrap();
        registry.set_ready("b", true).await.unwrap();

        // countdown_seconds=1 + post_game_grace_seconds=1, plus slack for
        // the spawned task to run.
        tokio::time::sleep(Duration::from_millis(2_500)).await;

        assert!(registry.status("a").await.is_none());
    }

    #[tokio::test]
    async fn cancel_before_first_tick_stops_the_timer() {
        let registry = registry();
        let lobby = registry.create("a".into()).await.unwrap();
        registry.join("b".into(), &lobby.code).await.unwrap();
        registry.set_ready("a", true).await.unwrap();
        registry.set_ready("b", true).await.unwrap();

        registry.set_ready("a", false).await.unwrap();
        let still_there = registry.status("a").await.unwrap();
        assert_eq!(still_there.status, LobbyStatus::Waiting);
    }
}

//! FIFO matchmaking queue: a single `VecDeque` of waiters, paired off
//! head-first. The lock is dropped before calling out to the registry
//! so a slow pairing can't stall new arrivals from enqueueing.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::Mutex;

use crate::protocol::{CoreError, DeviceId, ErrorKind, Lobby};
use crate::registry::{EventSink, LobbyRegistry};

struct Waiter {
    device_id: DeviceId,
    queued_at: DateTime<Utc>,
}

/// Outcome of `find_match`.
pub enum MatchOutcome {
    Queued { position: usize, eta_seconds: u64 },
    Paired(Lobby),
}

pub struct QueueStatus {
    pub in_queue: bool,
    pub position: Option<usize>,
    pub eta_seconds: Option<u64>,
}

pub struct MatchmakingQueue {
    waiters: Mutex<VecDeque<Waiter>>,
    registry: LobbyRegistry,
    event_sink: Arc<dyn EventSink>,
    eta_seconds: u64,
}

impl MatchmakingQueue {
    pub fn new(registry: LobbyRegistry, event_sink: Arc<dyn EventSink>, eta_seconds: u64) -> Self {
        Self {
            waiters: Mutex::new(VecDeque::new()),
            registry,
            event_sink,
            eta_seconds,
        }
    }

    /// Atomic enqueue-or-pair: pops the head waiter and pairs with them if
    /// one exists, otherwise enqueues `device_id`. Idempotent if the device
    /// is already queued.
    pub async fn find_match(&self, device_id: DeviceId) -> Result<MatchOutcome, CoreError> {
        if self.registry.is_member(&device_id) {
            return Err(ErrorKind::AlreadyInLobby.into());
        }

        let mut waiters = self.waiters.lock().await;
        if let Some(position) = waiters.iter().position(|w| w.device_id == device_id) {
            return Ok(MatchOutcome::Queued {
                position: position + 1,
                eta_seconds: self.eta_seconds,
            });
        }

        let Some(opponent) = waiters.pop_front() else {
            waiters.push_back(Waiter {
                device_id: device_id.clone(),
                queued_at: Utc::now(),
            });
            drop(waiters);
            self.event_sink
                .record("matchmaking_queue_join", json!({"device_id": device_id}))
                .await;
            return Ok(MatchOutcome::Queued {
                position: 1,
                eta_seconds: self.eta_seconds,
            });
        };
        drop(waiters);

        match self.registry.pair(opponent.device_id.clone(), device_id.clone()).await {
            Ok(lobby) => Ok(MatchOutcome::Paired(lobby)),
            Err(err) => {
                // Opponent vanished (e.g. joined another lobby between pop
                // and pair) — re-queue them ahead of the new arrival and
                // enqueue the caller.
                let mut waiters = self.waiters.lock().await;
                waiters.push_front(opponent);
                waiters.push_back(Waiter {
                    device_id: device_id.clone(),
                    queued_at: Utc::now(),
                });
                drop(waiters);
                if err.kind() == ErrorKind::AlreadyInLobby {
                    Ok(MatchOutcome::Queued {
                        position: 2,
                        eta_seconds: self.eta_seconds,
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn leave_queue(&self, device_id: &str) {
        let mut waiters = self.waiters.lock().await;
        waiters.retain(|w| w.device_id != device_id);
        drop(waiters);
        self.event_sink
            .record("matchmaking_queue_leave", json!({"device_id": device_id}))
            .await;
    }

    pub async fn queue_status(&self, device_id: &str) -> QueueStatus {
        let waiters = self.waiters.lock().await;
        match waiters.iter().position(|w| w.device_id == device_id) {
            Some(position) => QueueStatus {
                in_queue: true,
                position: Some(position + 1),
                eta_seconds: Some(self.eta_seconds),
            },
            None => QueueStatus {
                in_queue: false,
                position: None,
                eta_seconds: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::config::ServerConfig;
    use crate::registry::persistence::NoopPersistence;
    use crate::registry::player_directory::EchoPlayerDirectory;

    fn new_registry_and_queue() -> (LobbyRegistry, MatchmakingQueue) {
        let config = ServerConfig::default();
        let registry = LobbyRegistry::new(
            &config,
            Arc::new(Broadcaster::new()),
            Arc::new(crate::registry::event_sink::TracingEventSink),
            Arc::new(EchoPlayerDirectory),
            Arc::new(NoopPersistence),
        );
        let queue = MatchmakingQueue::new(
            registry.clone(),
            Arc::new(crate::registry::event_sink::TracingEventSink),
            30,
        );
        (registry, queue)
    }

    #[tokio::test]
    async fn first_finder_is_queued() {
        let (_registry, queue) = new_registry_and_queue();
        match queue.find_match("a".into()).await.unwrap() {
            MatchOutcome::Queued { position, .. } => assert_eq!(position, 1),
            MatchOutcome::Paired(_) => panic!("expected to be queued"),
        }
    }

    #[tokio::test]
    async fn second_finder_pairs_with_the_first() {
        let (_registry, queue) = new_registry_and_queue();
        queue.find_match("a".into()).await.unwrap();
        match queue.find_match("b".into()).await.unwrap() {
            MatchOutcome::Paired(lobby) => {
                assert!(lobby.has_member("a"));
                assert!(lobby.has_member("b"));
            }
            MatchOutcome::Queued { .. } => panic!("expected a pairing"),
        }
    }

    #[tokio::test]
    async fn leave_queue_is_idempotent() {
        let (_registry, queue) = new_registry_and_queue();
        queue.find_match("a".into()).await.unwrap();
        queue.leave_queue("a").await;
        queue.leave_queue("a").await;
        let status = queue.queue_status("a").await;
        assert!(!status.in_queue);
    }

    #[tokio::test]
    async fn already_in_lobby_cannot_find_match() {
        let (registry, queue) = new_registry_and_queue();
        registry.create("a".into()).await.unwrap();
        let err = queue.find_match("a".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInLobby);
    }
}

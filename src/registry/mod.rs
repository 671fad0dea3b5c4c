//! The lobby state machine core: index lock, then per-lobby lock, then
//! broadcast, in that order for every mutating operation.

pub mod event_sink;
pub mod player_directory;
pub mod persistence;

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Mutex;

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::matchmaking::MatchmakingQueue;
use crate::protocol::{
    CodeMint, CoreError, DeletionReason, DeviceId, ErrorKind, Lobby, LobbyId, LobbyStatus,
    ServerMessage,
};

pub use event_sink::EventSink;
pub use persistence::Persistence;
pub use player_directory::PlayerDirectory;

struct Inner {
    lobbies: DashMap<LobbyId, Arc<Mutex<Lobby>>>,
    codes: DashMap<String, LobbyId>,
    devices: DashMap<DeviceId, LobbyId>,
    code_mint: CodeMint,
    broadcaster: Arc<Broadcaster>,
    event_sink: Arc<dyn EventSink>,
    player_directory: Arc<dyn PlayerDirectory>,
    persistence: Arc<dyn Persistence>,
    max_players: u8,
    countdown_seconds: u64,
    post_game_grace_seconds: u64,
    /// Wired in once both the registry and the queue exist (see
    /// `wire_matchmaking_queue`); `create`/`join` use it to drop a device's
    /// queue entry, if any, on success.
    matchmaking_queue: OnceLock<Arc<MatchmakingQueue>>,
}

/// Cheap to clone: a thin handle over shared state held behind an `Arc`.
#[derive(Clone)]
pub struct LobbyRegistry {
    inner: Arc<Inner>,
}

impl LobbyRegistry {
    pub fn new(
        config: &ServerConfig,
        broadcaster: Arc<Broadcaster>,
        event_sink: Arc<dyn EventSink>,
        player_directory: Arc<dyn PlayerDirectory>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                lobbies: DashMap::new(),
                codes: DashMap::new(),
                devices: DashMap::new(),
                code_mint: CodeMint::new(config.code_length),
                broadcaster,
                event_sink,
                player_directory,
                persistence,
                max_players: config.max_players,
                countdown_seconds: config.countdown_seconds,
                post_game_grace_seconds: config.post_game_grace_seconds,
                matchmaking_queue: OnceLock::new(),
            }),
        }
    }

    /// Wires the matchmaking queue in after both it and the registry exist.
    /// Idempotent: a second call is a no-op.
    pub fn wire_matchmaking_queue(&self, queue: Arc<MatchmakingQueue>) {
        let _ = self.inner.matchmaking_queue.set(queue);
    }

    async fn leave_queue_if_present(&self, device_id: &str) {
        if let Some(queue) = self.inner.matchmaking_queue.get() {
            queue.leave_queue(device_id).await;
        }
    }

    pub fn countdown_seconds(&self) -> u64 {
        self.inner.countdown_seconds
    }

    pub fn post_game_grace_seconds(&self) -> u64 {
        self.inner.post_game_grace_seconds
    }

    pub fn is_member(&self, device_id: &str) -> bool {
        self.inner.devices.contains_key(device_id)
    }

    pub async fn create(&self, device_id: DeviceId) -> Result<Lobby, CoreError> {
        let user_name = self.inner.player_directory.resolve_name(&device_id).await;
        let codes = &self.inner.codes;
        let code = self.inner.code_mint.mint(&|candidate| codes.contains_key(candidate));

        let mut lobby = Lobby::new(code.clone(), self.inner.max_players);
        lobby.add_member(device_id.clone(), user_name);
        let lobby_id = lobby.id;

        match self.inner.devices.entry(device_id.clone()) {
            Entry::Occupied(_) => return Err(ErrorKind::AlreadyInLobby.into()),
            Entry::Vacant(e) => {
                e.insert(lobby_id);
            }
        }
        self.inner.codes.insert(code.clone(), lobby_id);
        let snapshot = lobby.clone();
        self.inner.lobbies.insert(lobby_id, Arc::new(Mutex::new(lobby)));

        self.leave_queue_if_present(&device_id).await;
        self.inner.persistence.mirror_lobby(&snapshot).await;
        self.inner
            .event_sink
            .record(
                "lobby_created",
                json!({"lobby_id": lobby_id, "code": code, "device_id": device_id}),
            )
            .await;
        Ok(snapshot)
    }

    pub async fn join(&self, device_id: DeviceId, code: &str) -> Result<Lobby, CoreError> {
        if self.inner.devices.contains_key(&device_id) {
            return Err(ErrorKind::AlreadyInLobby.into());
        }
        let lobby_id = *self
            .inner
            .codes
            .get(code)
            .ok_or(ErrorKind::NotFound)?
            .value();
        let lobby_arc = self
            .inner
            .lobbies
            .get(&lobby_id)
            .ok_or(ErrorKind::NotFound)?
            .clone();
        let user_name = self.inner.player_directory.resolve_name(&device_id).await;

        let snapshot = {
            let mut lobby = lobby_arc.lock().await;
            if lobby.has_member(&device_id) {
                return Err(ErrorKind::AlreadyInLobby.into());
            }
            if !lobby.can_join() {
                return Err(if lobby.is_full() {
                    ErrorKind::Full.into()
                } else {
                    ErrorKind::NotJoinable.into()
                });
            }
            match self.inner.devices.entry(device_id.clone()) {
                Entry::Occupied(_) => return Err(ErrorKind::AlreadyInLobby.into()),
                Entry::Vacant(e) => {
                    e.insert(lobby_id);
                }
            }
            lobby.add_member(device_id.clone(), user_name);
            lobby.clone()
        };

        self.inner
            .broadcaster
            .publish(lobby_id, ServerMessage::PlayerJoined { lobby: snapshot.view() });
        self.leave_queue_if_present(&device_id).await;
        self.inner.persistence.mirror_lobby(&snapshot).await;
        self.inner
            .event_sink
            .record(
                "lobby_joined",
                json!({"lobby_id": lobby_id, "code": code, "device_id": device_id}),
            )
            .await;
        Ok(snapshot)
    }

    /// No-op if the device is not in a lobby.
    pub async fn leave(&self, device_id: &str, disconnect: bool) -> Result<(), CoreError> {
        let Some(lobby_id) = self.inner.devices.get(device_id).map(|r| *r) else {
            return Ok(());
        };
        let Some(lobby_arc) = self.inner.lobbies.get(&lobby_id).map(|r| r.clone()) else {
            self.inner.devices.remove(device_id);
            return Ok(());
        };

        let (deleted, snapshot, was_counting_down) = {
            let mut lobby = lobby_arc.lock().await;
            let was_counting_down = lobby.status == LobbyStatus::Countdown;
            lobby.cancel_countdown();
            lobby.remove_member(device_id);
            (lobby.is_empty(), lobby.clone(), was_counting_down)
        };
        self.inner.devices.remove(device_id);

        if was_counting_down {
            self.inner.broadcaster.publish(
                lobby_id,
                ServerMessage::CountdownAborted { lobby: snapshot.view() },
            );
            self.inner
                .event_sink
                .record("countdown_aborted", json!({"lobby_id": lobby_id}))
                .await;
        }

        if deleted {
            self.inner.codes.remove(&snapshot.code);
            self.inner.lobbies.remove(&lobby_id);
            self.inner
                .broadcaster
                .publish(lobby_id, ServerMessage::LobbyDeleted { reason: DeletionReason::Empty });
            self.inner.broadcaster.drop_lobby(lobby_id);
            self.inner.persistence.mirror_deletion(lobby_id).await;
        } else {
            self.inner
                .broadcaster
                .publish(lobby_id, ServerMessage::PlayerLeft { lobby: snapshot.view() });
            self.inner.persistence.mirror_lobby(&snapshot).await;
        }

        let kind = if disconnect {
            "lobby_left_on_disconnect"
        } else {
            "lobby_left"
        };
        self.inner
            .event_sink
            .record(kind, json!({"lobby_id": lobby_id, "device_id": device_id}))
            .await;
        Ok(())
    }

    pub async fn set_ready(&self, device_id: &str, is_ready: bool) -> Result<Lobby, CoreError> {
        let lobby_id = self
            .inner
            .devices
            .get(device_id)
            .map(|r| *r)
            .ok_or(ErrorKind::NotInLobby)?;
        let lobby_arc = self
            .inner
            .lobbies
            .get(&lobby_id)
            .map(|r| r.clone())
            .ok_or(ErrorKind::NotInLobby)?;

        enum Outcome {
            Toggled(Lobby),
            Aborted(Lobby),
            StartedCountdown(Lobby, u64),
        }

        let outcome = {
            let mut lobby = lobby_arc.lock().await;
            if lobby.status == LobbyStatus::GameStarted {
                return Err(ErrorKind::InvalidState.into());
            }
            if !lobby.has_member(device_id) {
                return Err(ErrorKind::NotInLobby.into());
            }
            let was_counting_down = lobby.status == LobbyStatus::Countdown;
            lobby.set_ready(device_id, is_ready);

            if !is_ready && was_counting_down {
                lobby.cancel_countdown();
                Outcome::Aborted(lobby.clone())
            } else if lobby.all_ready() && !was_counting_down {
                let generation = lobby.start_countdown();
                Outcome::StartedCountdown(lobby.clone(), generation)
            } else {
                Outcome::Toggled(lobby.clone())
            }
        };

        match outcome {
            Outcome::Aborted(snapshot) => {
                self.inner.broadcaster.publish(
                    lobby_id,
                    ServerMessage::ReadyStatusChanged { lobby: snapshot.view() },
                );
                self.inner.broadcaster.publish(
                    lobby_id,
                    ServerMessage::CountdownAborted { lobby: snapshot.view() },
                );
                self.inner.persistence.mirror_lobby(&snapshot).await;
                self.inner
                    .event_sink
                    .record("ready_toggle", json!({"lobby_id": lobby_id, "device_id": device_id}))
                    .await;
                self.inner
                    .event_sink
                    .record("countdown_aborted", json!({"lobby_id": lobby_id}))
                    .await;
                Ok(snapshot)
            }
            Outcome::StartedCountdown(snapshot, generation) => {
                self.inner.broadcaster.publish(
                    lobby_id,
                    ServerMessage::ReadyStatusChanged { lobby: snapshot.view() },
                );
                self.inner.broadcaster.publish(
                    lobby_id,
                    ServerMessage::CountdownStarted { lobby: snapshot.view() },
                );
                self.inner.persistence.mirror_lobby(&snapshot).await;
                self.inner
                    .event_sink
                    .record("ready_toggle", json!({"lobby_id": lobby_id, "device_id": device_id}))
                    .await;
                self.inner
                    .event_sink
                    .record("countdown_started", json!({"lobby_id": lobby_id}))
                    .await;
                self.spawn_countdown(lobby_id, generation);
                Ok(snapshot)
            }
            Outcome::Toggled(snapshot) => {
                self.inner.broadcaster.publish(
                    lobby_id,
                    ServerMessage::ReadyStatusChanged { lobby: snapshot.view() },
                );
                self.inner.persistence.mirror_lobby(&snapshot).await;
                self.inner
                    .event_sink
                    .record("ready_toggle", json!({"lobby_id": lobby_id, "device_id": device_id}))
                    .await;
                Ok(snapshot)
            }
        }
    }

    pub async fn status(&self, device_id: &str) -> Option<Lobby> {
        let lobby_id = *self.inner.devices.get(device_id)?;
        let lobby_arc = self.inner.lobbies.get(&lobby_id)?.clone();
        let lobby = lobby_arc.lock().await;
        Some(lobby.clone())
    }

    /// Creates a lobby containing both `a` and `b`, called by
    /// [`crate::matchmaking::MatchmakingQueue`] once it has popped a waiter.
    pub async fn pair(&self, a: DeviceId, b: DeviceId) -> Result<Lobby, CoreError> {
        if self.inner.devices.contains_key(&a) || self.inner.devices.contains_key(&b) {
            return Err(ErrorKind::AlreadyInLobby.into());
        }
        let name_a = self.inner.player_directory.resolve_name(&a).await;
        let name_b = self.inner.player_directory.resolve_name(&b).await;
        let codes = &self.inner.codes;
        let code = self.inner.code_mint.mint(&|candidate| codes.contains_key(candidate));

        let mut lobby = Lobby::new(code.clone(), self.inner.max_players);
        lobby.add_member(a.clone(), name_a);
        lobby.add_member(b.clone(), name_b);
        let lobby_id = lobby.id;

        match self.inner.devices.entry(a.clone()) {
            Entry::Occupied(_) => return Err(ErrorKind::AlreadyInLobby.into()),
            Entry::Vacant(e) => {
                e.insert(lobby_id);
            }
        }
        match self.inner.devices.entry(b.clone()) {
            Entry::Occupied(_) => {
                self.inner.devices.remove(&a);
                return Err(ErrorKind::AlreadyInLobby.into());
            }
            Entry::Vacant(e) => {
                e.insert(lobby_id);
            }
        }

        self.inner.codes.insert(code.clone(), lobby_id);
        let snapshot = lobby.clone();
        self.inner.lobbies.insert(lobby_id, Arc::new(Mutex::new(lobby)));

        // One `player_joined` per joining member, in insertion order.
        self.inner
            .broadcaster
            .publish(lobby_id, ServerMessage::PlayerJoined { lobby: snapshot.view() });
        self.inner
            .broadcaster
            .publish(lobby_id, ServerMessage::PlayerJoined { lobby: snapshot.view() });

        self.inner.persistence.mirror_lobby(&snapshot).await;
        self.inner
            .event_sink
            .record(
                "matchmaking_match_found",
                json!({"lobby_id": lobby_id, "code": code, "device_ids": [a, b]}),
            )
            .await;
        Ok(snapshot)
    }

    /// Deletes lobbies that have sat idle in `Waiting` past `idle_timeout`.
    /// Not wired to any scheduler by default; available for a future
    /// maintenance task to call periodically.
    pub async fn sweep_stale(&self, idle_timeout: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut stale_ids = Vec::new();
        for entry in self.inner.lobbies.iter() {
            let lobby = entry.value().lock().await;
            if lobby.status == LobbyStatus::Waiting && now - lobby.updated_at > idle_timeout {
                stale_ids.push((lobby.id, lobby.code.clone(), lobby.members.iter().map(|m| m.device_id.clone()).collect::<Vec<_>>()));
            }
        }
        let count = stale_ids.len();
        for (lobby_id, code, device_ids) in stale_ids {
            self.inner.lobbies.remove(&lobby_id);
            self.inner.codes.remove(&code);
            for device_id in device_ids {
                self.inner.devices.remove(&device_id);
            }
            self.inner.broadcaster.drop_lobby(lobby_id);
        }
        count
    }

    fn spawn_countdown(&self, lobby_id: LobbyId, generation: u64) {
        let registry = self.clone();
        let duration_secs = self.inner.countdown_seconds;
        let grace_secs = self.inner.post_game_grace_seconds;
        tokio::spawn(async move {
            crate::countdown::run(registry, lobby_id, generation, duration_secs, grace_secs).await;
        });
    }

    pub(crate) async fn tick_if_current(
        &self,
        lobby_id: LobbyId,
        generation: u64,
        seconds_remaining: u64,
    ) -> bool {
        let Some(lobby_arc) = self.inner.lobbies.get(&lobby_id).map(|r| r.clone()) else {
            return false;
        };
        let lobby = lobby_arc.lock().await;
        if lobby.countdown_generation != generation || lobby.status != LobbyStatus::Countdown {
            return false;
        }
        drop(lobby);
        self.inner
            .broadcaster
            .publish(lobby_id, ServerMessage::CountdownTick { seconds_remaining });
        true
    }

    pub(crate) async fn complete_countdown(&self, lobby_id: LobbyId, generation: u64) -> Option<Lobby> {
        let lobby_arc = self.inner.lobbies.get(&lobby_id)?.clone();
        let mut lobby = lobby_arc.lock().await;
        if lobby.countdown_generation != generation || lobby.status != LobbyStatus::Countdown {
            return None;
        }
        lobby.finalize();
        Some(lobby.clone())
    }

    pub(crate) async fn announce_game_started(&self, lobby_id: LobbyId, snapshot: &Lobby) {
        self.inner.broadcaster.publish(
            lobby_id,
            ServerMessage::GameStarted { lobby_code: snapshot.code.clone() },
        );
        self.inner.persistence.mirror_lobby(snapshot).await;
        self.inner
            .event_sink
            .record("game_started", json!({"lobby_id": lobby_id, "code": snapshot.code}))
            .await;
    }

    pub(crate) async fn delete_finalized_lobby(&self, lobby_id: LobbyId) {
        let Some((_, lobby_arc)) = self.inner.lobbies.remove(&lobby_id) else {
            return;
        };
        let lobby = lobby_arc.lock().await;
        self.inner.codes.remove(&lobby.code);
        for member in &lobby.members {
            self.inner.devices.remove(&member.device_id);
        }
        drop(lobby);

        self.inner
            .broadcaster
            .publish(lobby_id, ServerMessage::LobbyDeleted { reason: DeletionReason::GameStarted });
        self.inner.broadcaster.drop_lobby(lobby_id);
        self.inner
            .event_sink
            .record("lobby_deleted", json!({"lobby_id": lobby_id, "reason": "game_started"}))
            .await;
        self.inner.persistence.mirror_deletion(lobby_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_sink::TracingEventSink;
    use persistence::NoopPersistence;
    use player_directory::EchoPlayerDirectory;

    fn registry() -> LobbyRegistry {
        let config = ServerConfig {
            countdown_seconds: 3,
            post_game_grace_seconds: 2,
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
    async fn create_then_join_fills_lobby() {
        let registry = registry();
        let lobby = registry.create("a".into()).await.unwrap();
        assert_eq!(lobby.current_players(), 1);

        let lobby = registry.join("b".into(), &lobby.code).await.unwrap();
        assert_eq!(lobby.current_players(), 2);
    }

    #[tokio::test]
    async fn join_unknown_code_is_not_found() {
        let registry = registry();
        let err = registry.join("a".into(), "ZZZZ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn already_in_lobby_rejects_second_create() {
        let registry = registry();
        registry.create("a".into()).await.unwrap();
        let err = registry.create("a".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInLobby);
    }

    #[tokio::test]
    async fn joining_a_full_lobby_fails() {
        let registry = registry();
        let lobby = registry.create("a".into()).await.unwrap();
        registry.join("b".into(), &lobby.code).await.unwrap();
        let err = registry.join("c".into(), &lobby.code).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Full);
    }

    #[tokio::test]
    async fn both_ready_enters_countdown() {
        let registry = registry();
        let lobby = registry.create("a".into()).await.unwrap();
        registry.join("b".into(), &lobby.code).await.unwrap();
        registry.set_ready("a", true).await.unwrap();
        let lobby = registry.set_ready("b", true).await.unwrap();
        assert_eq!(lobby.status, LobbyStatus::Countdown);
    }

    #[tokio::test]
    async fn unready_during_countdown_resets_to_waiting() {
        let registry = registry();
        let lobby = registry.create("a".into()).await.unwrap();
        registry.join("b".into(), &lobby.code).await.unwrap();
        registry.set_ready("a", true).await.unwrap();
        registry.set_ready("b", true).await.unwrap();
        let lobby = registry.set_ready("a", false).await.unwrap();
        assert_eq!(lobby.status, LobbyStatus::Waiting);
        assert!(!lobby.member("b").unwrap().is_ready);
    }

    #[tokio::test]
    async fn last_leaver_deletes_lobby() {
        let registry = registry();
        let lobby = registry.create("a".into()).await.unwrap();
        registry.leave("a", false).await.unwrap();
        assert!(registry.status("a").await.is_none());
        // code must be free for reuse
        assert!(registry.inner.codes.get(&lobby.code).is_none());
    }

    #[tokio::test]
    async fn pair_creates_lobby_with_both_devices() {
        let registry = registry();
        let lobby = registry.pair("a".into(), "b".into()).await.unwrap();
        assert_eq!(lobby.current_players(), 2);
        assert!(lobby.has_member("a"));
        assert!(lobby.has_member("b"));
    }

    #[tokio::test]
    async fn create_drops_a_pending_queue_entry() {
        let registry = registry();
        let queue = Arc::new(crate::matchmaking::MatchmakingQueue::new(
            registry.clone(),
            Arc::new(TracingEventSink),
            30,
        ));
        registry.wire_matchmaking_queue(queue.clone());

        queue.find_match("a".into()).await.unwrap();
        assert!(queue.queue_status("a").await.in_queue);

        registry.create("a".into()).await.unwrap();
        assert!(!queue.queue_status("a").await.in_queue);
    }

    #[tokio::test]
    async fn join_drops_a_pending_queue_entry() {
        let registry = registry();
        let queue = Arc::new(crate::matchmaking::MatchmakingQueue::new(
            registry.clone(),
            Arc::new(TracingEventSink),
            30,
        ));
        registry.wire_matchmaking_queue(queue.clone());

        let lobby = registry.create("a".into()).await.unwrap();
        queue.find_match("b".into()).await.unwrap();
        assert!(queue.queue_status("b").await.in_queue);

        registry.join("b".into(), &lobby.code).await.unwrap();
        assert!(!queue.queue_status("b").await.in_queue);
    }
}

use async_trait::async_trait;

use crate::protocol::{Lobby, LobbyId};

/// Optional, advisory mirror of lobby state. Never authoritative:
/// in-memory registry state always wins, and a mirroring failure is
/// logged, never propagated.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn mirror_lobby(&self, lobby: &Lobby);
    async fn mirror_deletion(&self, lobby_id: LobbyId);
}

/// No-op persistence used when no `persistence_url` is configured.
pub struct NoopPersistence;

#[async_trait]
impl Persistence for NoopPersistence {
    async fn mirror_lobby(&self, _lobby: &Lobby) {}
    async fn mirror_deletion(&self, _lobby_id: LobbyId) {}
}

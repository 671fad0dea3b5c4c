//! Tracks active subscriber sockets and routes their disconnects into the
//! registry: register on connect, unregister when the socket's task ends.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::broadcast::{BroadcastMessage, Broadcaster};
use crate::protocol::{CoreError, DeviceId, ErrorKind, LobbyId};
use crate::registry::LobbyRegistry;

pub struct ConnectionHub {
    registry: LobbyRegistry,
    broadcaster: Arc<Broadcaster>,
}

impl ConnectionHub {
    pub fn new(registry: LobbyRegistry, broadcaster: Arc<Broadcaster>) -> Self {
        Self { registry, broadcaster }
    }

    /// Verifies `device_id` is a current member of the lobby named by
    /// `code`, then subscribes it to that lobby's broadcast topic. Returns
    /// the lobby id (needed by the caller to unsubscribe later) and the
    /// receiving half of the channel the caller forwards to the socket.
    pub async fn connect(
        &self,
        code: &str,
        device_id: DeviceId,
    ) -> Result<(LobbyId, mpsc::UnboundedReceiver<BroadcastMessage>), CoreError> {
        let lobby = self
            .registry
            .status(&device_id)
            .await
            .ok_or(ErrorKind::NotFound)?;
        if lobby.code != code || !lobby.has_member(&device_id) {
            return Err(ErrorKind::NotInLobby.into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.broadcaster.subscribe(lobby.id, device_id, tx);
        Ok((lobby.id, rx))
    }

    /// Called when a socket closes, cleanly or abruptly. Unsubscribes and
    /// drives the device out of its lobby exactly as an explicit
    /// `POST /lobby/leave` would, logging the disconnect-flavored event
    /// kind.
    pub async fn disconnect(&self, lobby_id: LobbyId, device_id: &str) {
        self.broadcaster.unsubscribe(lobby_id, device_id);
        let _ = self.registry.leave(device_id, true).await;
    }
}

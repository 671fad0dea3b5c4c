use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque player identity. The core never validates or invents these; it
/// only resolves a display name for them through `PlayerDirectory`.
pub type DeviceId = String;

/// Unique identifier for a lobby.
pub type LobbyId = Uuid;

/// A player's membership record inside a lobby.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub device_id: DeviceId,
    pub user_name: String,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new(device_id: DeviceId, user_name: String) -> Self {
        Self {
            device_id,
            user_name,
            is_ready: false,
            joined_at: Utc::now(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lobby_state::LobbyView;

/// Events published by the Broadcaster, tagged adjacently as
/// `{type, data}` so clients can dispatch on `type` without inspecting
/// payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    PlayerJoined { lobby: LobbyView },
    PlayerLeft { lobby: LobbyView },
    ReadyStatusChanged { lobby: LobbyView },
    CountdownStarted { lobby: LobbyView },
    CountdownTick { seconds_remaining: u64 },
    CountdownAborted { lobby: LobbyView },
    GameStarted { lobby_code: String },
    LobbyDeleted { reason: DeletionReason },
    Error { message: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeletionReason {
    GameStarted,
    Empty,
}

/// Wire envelope for a published event: `{type, data, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsFrame {
    #[serde(flatten)]
    pub message: ServerMessage,
    pub timestamp: DateTime<Utc>,
}

impl WsFrame {
    pub fn new(message: ServerMessage) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
        }
    }
}

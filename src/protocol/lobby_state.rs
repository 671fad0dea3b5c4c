use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{DeviceId, LobbyId, Member};

/// Lobby lifecycle status. `ReadyCheck` is kept fully ephemeral: a caller
/// polling `status()` never observes it, since the transition into and out
/// of it happens within a single locked `set_ready` call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    #[default]
    Waiting,
    ReadyCheck,
    Countdown,
    GameStarted,
}

/// A lobby: a fixed number of seats, a machine-readable status, and the
/// ordered list of current members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lobby {
    pub id: LobbyId,
    pub code: String,
    pub status: LobbyStatus,
    pub max_players: u8,
    pub members: Vec<Member>,
    pub countdown_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every `cancel_countdown`; an in-flight countdown tick
    /// reads this before publishing and suppresses itself if it no longer
    /// matches the generation it was spawned with.
    pub countdown_generation: u64,
}

impl Lobby {
    pub fn new(code: String, max_players: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            status: LobbyStatus::Waiting,
            max_players,
            members: Vec::with_capacity(max_players as usize),
            countdown_start_time: None,
            created_at: now,
            updated_at: now,
            countdown_generation: 0,
        }
    }

    pub fn current_players(&self) -> u8 {
        self.members.len() as u8
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.current_players() >= self.max_players
    }

    pub fn can_join(&self) -> bool {
        self.status == LobbyStatus::Waiting && !self.is_full()
    }

    pub fn has_member(&self, device_id: &str) -> bool {
        self.members.iter().any(|m| m.device_id == device_id)
    }

    pub fn member(&self, device_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.device_id == device_id)
    }

    /// Adds a member unready, touching `updated_at`. Caller is responsible
    /// for the `can_join`/capacity/duplicate checks before calling this.
    pub fn add_member(&mut self, device_id: DeviceId, user_name: String) {
        self.members.push(Member::new(device_id, user_name));
        self.updated_at = Utc::now();
    }

    /// Removes a member if present, unconditionally resetting every
    /// remaining member's ready flag and dropping out of `ReadyCheck`/
    /// `Countdown` back to `Waiting`. Returns whether the member was found.
    pub fn remove_member(&mut self, device_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.device_id != device_id);
        let removed = self.members.len() != before;
        if removed {
            self.reset_readies();
            if self.status != LobbyStatus::GameStarted {
                self.status = LobbyStatus::Waiting;
            }
            self.countdown_start_time = None;
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn reset_readies(&mut self) {
        for member in &mut self.members {
            member.is_ready = false;
        }
    }

    /// Toggles a member's ready flag. Returns `false` if the device is not
    /// a member.
    pub fn set_ready(&mut self, device_id: &str, is_ready: bool) -> bool {
        match self.members.iter_mut().find(|m| m.device_id == device_id) {
            Some(member) => {
                member.is_ready = is_ready;
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn all_ready(&self) -> bool {
        self.is_full() && self.members.iter().all(|m| m.is_ready)
    }

    /// Starts the countdown, bumping the generation so any still-pending
    /// ticks from a previous (cancelled) countdown are invalidated.
    pub fn start_countdown(&mut self) -> u64 {
        self.status = LobbyStatus::Countdown;
        self.countdown_start_time = Some(Utc::now());
        self.countdown_generation += 1;
        self.updated_at = Utc::now();
        self.countdown_generation
    }

    /// Cancels an in-progress countdown. Idempotent: calling this when no
    /// countdown is active still bumps the generation so any stray
    /// in-flight tick is invalidated.
    pub fn cancel_countdown(&mut self) {
        self.countdown_generation += 1;
        self.countdown_start_time = None;
        if self.status == LobbyStatus::Countdown || self.status == LobbyStatus::ReadyCheck {
            self.status = LobbyStatus::Waiting;
        }
        self.updated_at = Utc::now();
    }

    pub fn finalize(&mut self) {
        self.status = LobbyStatus::GameStarted;
        self.updated_at = Utc::now();
    }

    /// The wire-format projection: `members` becomes `players`,
    /// `current_players` is computed rather than stored, and internal-only
    /// fields (`updated_at`, `countdown_generation`) are not exposed.
    pub fn view(&self) -> LobbyView {
        LobbyView {
            id: self.id,
            code: self.code.clone(),
            status: self.status,
            max_players: self.max_players,
            current_players: self.current_players(),
            players: self.members.iter().map(PlayerView::from).collect(),
            countdown_start_time: self.countdown_start_time,
            created_at: self.created_at,
        }
    }
}

/// A single player entry in the wire-format lobby view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub device_id: DeviceId,
    pub user_name: String,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

impl From<&Member> for PlayerView {
    fn from(member: &Member) -> Self {
        Self {
            device_id: member.device_id.clone(),
            user_name: member.user_name.clone(),
            is_ready: member.is_ready,
            joined_at: member.joined_at,
        }
    }
}

/// The JSON shape returned to clients:
/// `{id, code, status, max_players, current_players, players, countdown_start_time, created_at}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyView {
    pub id: LobbyId,
    pub code: String,
    pub status: LobbyStatus,
    pub max_players: u8,
    pub current_players: u8,
    pub players: Vec<PlayerView>,
    pub countdown_start_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub mod error;
pub mod lobby_codes;
pub mod lobby_state;
pub mod messages;
pub mod types;

pub use error::{CoreError, ErrorKind};
pub use lobby_codes::CodeMint;
pub use lobby_state::{Lobby, LobbyStatus, LobbyView, PlayerView};
pub use messages::{DeletionReason, ServerMessage, WsFrame};
pub use types::{DeviceId, LobbyId, Member};

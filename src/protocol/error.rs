use thiserror::Error;

/// The error kinds surfaced by the lobby coordinator core.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    AlreadyInLobby,
    NotInLobby,
    Full,
    NotJoinable,
    InvalidState,
    Internal,
}

impl ErrorKind {
    /// Human-readable, actionable description.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "missing or empty X-Device-ID header",
            ErrorKind::NotFound => "no lobby exists for that code",
            ErrorKind::AlreadyInLobby => "device is already a member of a lobby",
            ErrorKind::NotInLobby => "device is not a member of any lobby",
            ErrorKind::Full => "lobby already has the maximum number of players",
            ErrorKind::NotJoinable => "lobby is no longer accepting new players",
            ErrorKind::InvalidState => "operation is not valid for the lobby's current status",
            ErrorKind::Internal => "an unexpected internal error occurred",
        }
    }

    /// HTTP status code this kind maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyInLobby
            | ErrorKind::NotInLobby
            | ErrorKind::Full
            | ErrorKind::NotJoinable
            | ErrorKind::InvalidState => 409,
            ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// The core's error type. `Unexpected` wraps arbitrary internal failures
/// (persistence I/O, etc.) through `anyhow::Error`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Known(ErrorKind),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Known(kind) => *kind,
            CoreError::Unexpected(_) => ErrorKind::Internal,
        }
    }
}

impl From<ErrorKind> for CoreError {
    fn from(kind: ErrorKind) -> Self {
        CoreError::Known(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_description() {
        for kind in [
            ErrorKind::Unauthenticated,
            ErrorKind::NotFound,
            ErrorKind::AlreadyInLobby,
            ErrorKind::NotInLobby,
            ErrorKind::Full,
            ErrorKind::NotJoinable,
            ErrorKind::InvalidState,
            ErrorKind::Internal,
        ] {
            assert!(!kind.description().is_empty());
        }
    }

    #[test]
    fn status_codes_match_documented_values() {
        assert_eq!(ErrorKind::Unauthenticated.status_code(), 401);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::AlreadyInLobby.status_code(), 409);
        assert_eq!(ErrorKind::Internal.status_code(), 500);
    }
}

//! Error types for the lobby layer.

use quadra_protocol::{LobbyId, PlayerId};

/// Errors that can occur during lobby operations.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The lobby does not exist.
    #[error("lobby {0} not found")]
    NotFound(LobbyId),

    /// The lobby roster is full.
    #[error("lobby {0} is full")]
    Full(LobbyId),

    /// The player is already a member of a lobby.
    #[error("player {0} is already in lobby {1}")]
    AlreadyInLobby(PlayerId, LobbyId),

    /// The player is not a member of any lobby.
    #[error("player {0} is not in a lobby")]
    NotInLobby(PlayerId),

    /// A display or lobby name failed validation. Hard rejection, no
    /// silent truncation.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The lobby is in a state that does not allow this operation.
    #[error("invalid lobby state for this operation: {0}")]
    InvalidState(String),

    /// The start gate did not pass. The lobby state is unchanged.
    #[error("cannot start lobby {0}: {1}")]
    CannotStart(LobbyId, String),
}

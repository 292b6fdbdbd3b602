//! Error types for the session layer.

use quadra_protocol::{LobbyId, PlayerId};

/// Errors that can occur during session coordination and reconnection.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session for this game already exists. A lobby is promoted to
    /// a session exactly once.
    #[error("game {0} already has a session")]
    GameExists(LobbyId),

    /// The player already belongs to another running game.
    #[error("player {0} is already in game {1}")]
    AlreadyInGame(PlayerId, LobbyId),

    /// The identity has no disconnect record: it is unknown, or its
    /// record was already purged.
    #[error("no reconnectable state for player {0}")]
    NoDisconnectRecord(PlayerId),

    /// The reconnection grace window elapsed. The record is purged.
    #[error("reconnect window expired for player {0}")]
    GraceExpired(PlayerId),

    /// The game ID supplied on reconnect does not match the record.
    #[error("game mismatch on reconnect: expected {expected}, got {supplied}")]
    GameMismatch {
        expected: LobbyId,
        supplied: LobbyId,
    },
}

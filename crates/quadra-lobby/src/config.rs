//! Lobby configuration and lifecycle state machine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Roster limits for a lobby.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// Minimum players required to start the game.
    pub min_players: usize,

    /// Maximum players allowed in the roster.
    pub max_players: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a lobby.
///
/// Transitions are strictly ordered — no skipping states:
///
/// ```text
/// Waiting → Starting → InProgress → Finished
/// ```
///
/// - **Waiting**: accepting joins, members toggling ready.
/// - **Starting**: the start gate passed; the coordinator is building
///   the game session. Externally visible but brief.
/// - **InProgress**: the game session exists and is running.
/// - **Finished**: the game reached a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyStatus {
    Waiting,
    Starting,
    InProgress,
    Finished,
}

impl LobbyStatus {
    /// Returns `true` if the lobby is accepting new players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` if the lobby has a live or starting game.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::InProgress)
    }

    /// Attempts to transition to the next state.
    ///
    /// Returns `Some(next)` if a further state exists, `None` at the
    /// end of the lifecycle.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Starting),
            Self::Starting => Some(Self::InProgress),
            Self::InProgress => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Starting => write!(f, "Starting"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

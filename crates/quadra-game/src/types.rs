//! Core value types shared by the game-state interface and the pipeline.

use std::fmt;

use quadra_protocol::{HealthTier, Position, TokenId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SeatId
// ---------------------------------------------------------------------------

/// A position at the table. Seats are dense and zero-based: a game of
/// `n` players occupies seats `0..n`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SeatId(pub u8);

impl SeatId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// One token, deployed or destroyed. Tokens in reserve are not `Token`
/// values yet; they become one at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub owner: SeatId,
    pub health: u32,
    /// `None` once the token has been removed from the board.
    pub position: Option<Position>,
}

impl Token {
    pub fn is_deployed(&self) -> bool {
        self.position.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// The coarse lifecycle of a whole game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    /// Created but not started.
    Setup,
    /// Actions are being accepted.
    Playing,
    /// A winner has been decided.
    Finished,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Playing => "playing",
            Self::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// The two halves of one player's turn. Every turn starts in the
/// movement phase; a move or deploy advances it to the action phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Movement,
    Action,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Movement => "movement",
            Self::Action => "action",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Cells
// ---------------------------------------------------------------------------

/// What kind of cell a board position is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Normal,
    /// Landing here triggers a random effect on the arriving token.
    Mystery,
}

// ---------------------------------------------------------------------------
// Rule outcomes
// ---------------------------------------------------------------------------

/// The resolution of one attack, as computed by the combat rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatOutcome {
    /// Damage dealt to the defender.
    pub damage: u32,
    /// Defender health after the damage is applied.
    pub defender_health: u32,
    /// `true` if the defender was destroyed.
    pub killed: bool,
}

/// The effect a mystery cell had on the token that landed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "lowercase")]
pub enum MysteryOutcome {
    Heal {
        old_health: u32,
        new_health: u32,
    },
    Teleport {
        new_position: Position,
    },
}

// ---------------------------------------------------------------------------
// Pipeline results
// ---------------------------------------------------------------------------

/// The verdict of validating one action without executing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Human-readable reason when invalid; empty when valid.
    pub message: String,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            message: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }
}

/// What an executed action did to the game, in enough detail for the
/// server to tell everyone about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Moved {
        token_id: TokenId,
        from: Position,
        to: Position,
        /// Present when the destination was a mystery cell.
        mystery: Option<MysteryOutcome>,
    },
    Attacked {
        attacker_id: TokenId,
        defender_id: TokenId,
        combat: CombatOutcome,
    },
    Deployed {
        token_id: TokenId,
        seat: SeatId,
        tier: HealthTier,
        position: Position,
    },
    TurnEnded {
        next_seat: SeatId,
        turn_number: u32,
    },
}

/// The result of executing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub outcome: Option<ActionOutcome>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>, outcome: ActionOutcome) -> Self {
        Self {
            success: true,
            message: message.into(),
            outcome: Some(outcome),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            outcome: None,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

//! In-game action values and their wire mapping.
//!
//! An [`Action`] is an immutable request value — it does not carry the
//! acting player; identity is supplied alongside at validation time.
//! The four kinds form a closed tagged union, so the pipeline dispatches
//! with an exhaustive match and a new action kind is a compile-time
//! checked change.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{Message, MessageKind, ProtocolError};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A board cell coordinate. Encoded on the wire as a two-element pair
/// `[x, y]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Position> for (i32, i32) {
    fn from(pos: Position) -> Self {
        (pos.x, pos.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// A unique identifier for a token on the board or in reserve.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenId(pub u32);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HealthTier
// ---------------------------------------------------------------------------

/// One of the four fixed token health values a player can deploy from
/// reserve. Anything else fails to decode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum HealthTier {
    Ten = 10,
    Twenty = 20,
    Thirty = 30,
    Forty = 40,
}

impl HealthTier {
    /// All tiers, lowest first.
    pub const ALL: [HealthTier; 4] =
        [Self::Ten, Self::Twenty, Self::Thirty, Self::Forty];

    /// The health value a token of this tier starts with.
    pub fn value(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for HealthTier {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(Self::Ten),
            20 => Ok(Self::Twenty),
            30 => Ok(Self::Thirty),
            40 => Ok(Self::Forty),
            other => Err(format!("{other} is not a reserve tier")),
        }
    }
}

impl From<HealthTier> for u32 {
    fn from(tier: HealthTier) -> Self {
        tier.value()
    }
}

impl fmt::Display for HealthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier-{}", self.value())
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One in-game action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move a deployed token to a destination cell.
    Move {
        token_id: TokenId,
        destination: Position,
    },

    /// Attack an adjacent enemy token.
    Attack {
        attacker_id: TokenId,
        defender_id: TokenId,
    },

    /// Place a reserve token of the given tier on the board.
    Deploy {
        tier: HealthTier,
        destination: Position,
    },

    /// Pass the turn without (further) acting.
    EndTurn,
}

impl Action {
    /// The message kind this action travels as.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Move { .. } => MessageKind::Move,
            Self::Attack { .. } => MessageKind::Attack,
            Self::Deploy { .. } => MessageKind::Deploy,
            Self::EndTurn => MessageKind::EndTurn,
        }
    }

    /// A short lowercase name for error reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::Deploy { .. } => "deploy",
            Self::EndTurn => "end_turn",
        }
    }

    /// Builds the wire message for this action.
    pub fn to_message(&self) -> Message {
        match *self {
            Self::Move {
                token_id,
                destination,
            } => Message::new(MessageKind::Move)
                .with("token_id", json!(token_id))
                .with("destination", json!(destination)),

            Self::Attack {
                attacker_id,
                defender_id,
            } => Message::new(MessageKind::Attack)
                .with("attacker_id", json!(attacker_id))
                .with("defender_id", json!(defender_id)),

            Self::Deploy { tier, destination } => {
                Message::new(MessageKind::Deploy)
                    .with("tier", json!(tier))
                    .with("destination", json!(destination))
            }

            Self::EndTurn => Message::new(MessageKind::EndTurn),
        }
    }

    /// Recovers the action from a wire message.
    ///
    /// # Errors
    /// - [`ProtocolError::NotAnAction`] if the kind is not an action kind.
    /// - [`ProtocolError::InvalidMessage`] if a required field is missing
    ///   or mistyped.
    pub fn from_message(msg: &Message) -> Result<Self, ProtocolError> {
        match msg.kind {
            MessageKind::Move => Ok(Self::Move {
                token_id: field(msg, "token_id")?,
                destination: field(msg, "destination")?,
            }),
            MessageKind::Attack => Ok(Self::Attack {
                attacker_id: field(msg, "attacker_id")?,
                defender_id: field(msg, "defender_id")?,
            }),
            MessageKind::Deploy => Ok(Self::Deploy {
                tier: field(msg, "tier")?,
                destination: field(msg, "destination")?,
            }),
            MessageKind::EndTurn => Ok(Self::EndTurn),
            other => Err(ProtocolError::NotAnAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move {
                token_id,
                destination,
            } => write!(f, "move {token_id} to {destination}"),
            Self::Attack {
                attacker_id,
                defender_id,
            } => write!(f, "attack {defender_id} with {attacker_id}"),
            Self::Deploy { tier, destination } => {
                write!(f, "deploy {tier} at {destination}")
            }
            Self::EndTurn => write!(f, "end turn"),
        }
    }
}

/// Extracts and deserializes one `data` field from a message.
fn field<T: serde::de::DeserializeOwned>(
    msg: &Message,
    name: &str,
) -> Result<T, ProtocolError> {
    let value = msg.get(name).ok_or_else(|| {
        ProtocolError::InvalidMessage(format!(
            "{} message missing field '{name}'",
            msg.kind
        ))
    })?;
    serde_json::from_value(value.clone()).map_err(|e| {
        ProtocolError::InvalidMessage(format!(
            "{} message field '{name}': {e}",
            msg.kind
        ))
    })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_serializes_as_coordinate_pair() {
        let json = serde_json::to_string(&Position::new(3, 7)).unwrap();
        assert_eq!(json, "[3,7]");
    }

    #[test]
    fn test_position_deserializes_from_coordinate_pair() {
        let pos: Position = serde_json::from_str("[2,5]").unwrap();
        assert_eq!(pos, Position::new(2, 5));
    }

    #[test]
    fn test_health_tier_value_and_round_trip() {
        for tier in HealthTier::ALL {
            assert_eq!(HealthTier::try_from(tier.value()), Ok(tier));
        }
        assert_eq!(HealthTier::Ten.value(), 10);
        assert_eq!(HealthTier::Forty.value(), 40);
    }

    #[test]
    fn test_health_tier_rejects_non_tier_value() {
        assert!(HealthTier::try_from(15).is_err());
        let decoded: Result<HealthTier, _> = serde_json::from_str("25");
        assert!(decoded.is_err());
    }

    #[test]
    fn test_move_round_trips_through_message() {
        let action = Action::Move {
            token_id: TokenId(7),
            destination: Position::new(3, 4),
        };
        let msg = action.to_message();
        assert_eq!(msg.kind, MessageKind::Move);
        assert_eq!(Action::from_message(&msg).unwrap(), action);
    }

    #[test]
    fn test_attack_round_trips_through_message() {
        let action = Action::Attack {
            attacker_id: TokenId(1),
            defender_id: TokenId(9),
        };
        let msg = action.to_message();
        assert_eq!(msg.kind, MessageKind::Attack);
        assert_eq!(Action::from_message(&msg).unwrap(), action);
    }

    #[test]
    fn test_deploy_round_trips_through_message() {
        let action = Action::Deploy {
            tier: HealthTier::Thirty,
            destination: Position::new(0, 9),
        };
        let msg = action.to_message();
        assert_eq!(msg.kind, MessageKind::Deploy);
        assert_eq!(msg.get_u64("tier"), Some(30));
        assert_eq!(Action::from_message(&msg).unwrap(), action);
    }

    #[test]
    fn test_end_turn_round_trips_through_message() {
        let msg = Action::EndTurn.to_message();
        assert_eq!(msg.kind, MessageKind::EndTurn);
        assert_eq!(Action::from_message(&msg).unwrap(), Action::EndTurn);
    }

    #[test]
    fn test_from_message_rejects_non_action_kind() {
        let msg = Message::new(MessageKind::Chat);
        let result = Action::from_message(&msg);
        assert!(matches!(result, Err(ProtocolError::NotAnAction(_))));
    }

    #[test]
    fn test_from_message_names_missing_field() {
        let msg = Message::new(MessageKind::Move)
            .with("token_id", json!(TokenId(1)));
        let err = Action::from_message(&msg).unwrap_err();
        assert!(err.to_string().contains("destination"));
    }

    #[test]
    fn test_from_message_rejects_mistyped_field() {
        let msg = Message::new(MessageKind::Deploy)
            .with("tier", json!("heavy"))
            .with("destination", json!([0, 0]));
        let result = Action::from_message(&msg);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_action_display() {
        let action = Action::Move {
            token_id: TokenId(2),
            destination: Position::new(1, 1),
        };
        assert_eq!(action.to_string(), "move T-2 to (1, 1)");
        assert_eq!(Action::EndTurn.to_string(), "end turn");
    }
}

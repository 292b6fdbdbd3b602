//! Game-side core: the state/rule interfaces a concrete game plugs
//! into, and the phase-aware pipeline that validates and applies
//! actions against them.
//!
//! The pipeline is deliberately ignorant of board geometry, movement
//! ranges, combat math and mystery effects; those are supplied through
//! the [`state`] traits. What it owns is legality: turn order, turn
//! phase, ownership, and the bookkeeping an applied action implies.

pub mod pipeline;
pub mod state;
pub mod types;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use pipeline::{execute_action, validate_action};
pub use state::{
    Board, CombatRules, DeploymentRules, GameBuilder, GameState, MovementRules, MysteryRules,
    Ruleset,
};
pub use types::{
    ActionOutcome, ActionResult, CellKind, CombatOutcome, GamePhase, MysteryOutcome, SeatId,
    Token, TurnPhase, ValidationResult,
};

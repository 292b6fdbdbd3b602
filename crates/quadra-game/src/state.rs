//! The seams between the generic pipeline and a concrete game.
//!
//! The pipeline never hard-codes board geometry, movement range, combat
//! math, mystery effects, or deployment zones. It drives a [`GameState`]
//! through these traits and asks the [`Ruleset`] collaborators every
//! question whose answer is game-specific.

use std::collections::HashSet;

use quadra_protocol::{HealthTier, Position, TokenId};

use crate::types::{CellKind, CombatOutcome, GamePhase, MysteryOutcome, SeatId, Token, TurnPhase};

// ---------------------------------------------------------------------------
// Board and game state
// ---------------------------------------------------------------------------

/// The spatial half of a game: cells and their occupancy.
pub trait Board {
    /// Returns `true` if `pos` is on the board.
    fn is_valid_position(&self, pos: Position) -> bool;

    /// The kind of cell at `pos`, or `None` off the board.
    fn cell_kind(&self, pos: Position) -> Option<CellKind>;

    /// The token occupying `pos`, if any.
    fn occupant(&self, pos: Position) -> Option<TokenId>;

    /// Marks `pos` as occupied by `token`.
    fn set_occupant(&mut self, pos: Position, token: TokenId);

    /// Marks `pos` as empty.
    fn clear_occupant(&mut self, pos: Position);
}

/// Everything the pipeline needs to read and mutate a running game.
///
/// Mutating operations that span the board and a token (a move, a
/// deploy) keep both sides consistent themselves; the pipeline only
/// performs raw occupancy edits when applying a teleport.
pub trait GameState: Send + 'static {
    type Board: Board;

    fn board(&self) -> &Self::Board;
    fn board_mut(&mut self) -> &mut Self::Board;

    /// Transitions the game out of setup. Called exactly once, after
    /// all seats are named.
    fn begin(&mut self);

    fn token(&self, id: TokenId) -> Option<&Token>;

    /// Removes a destroyed token. The caller clears its board cell.
    fn remove_token(&mut self, id: TokenId);

    fn set_token_health(&mut self, id: TokenId, health: u32);

    /// Writes a token's position without touching board occupancy.
    fn set_token_position(&mut self, id: TokenId, pos: Position);

    fn player_name(&self, seat: SeatId) -> Option<String>;
    fn set_player_name(&mut self, seat: SeatId, name: &str);

    fn phase(&self) -> GamePhase;

    /// The winning seat once the game is finished.
    fn winner(&self) -> Option<SeatId>;

    fn current_turn(&self) -> SeatId;
    fn turn_phase(&self) -> TurnPhase;
    fn set_turn_phase(&mut self, phase: TurnPhase);
    fn turn_number(&self) -> u32;

    /// Passes the turn: rotates the seat, resets the turn phase to
    /// movement and advances the turn counter. Returns the new seat
    /// and turn number.
    fn end_turn(&mut self) -> (SeatId, u32);

    /// Relocates a deployed token, updating occupancy on both cells.
    /// Returns `false` if the board rejects the move.
    fn move_token(&mut self, id: TokenId, dest: Position) -> bool;

    /// Takes one reserve token of `tier` for `seat` and places it at
    /// `pos`. Returns the new token's ID, or `None` if the state
    /// rejects the placement.
    fn deploy_token(&mut self, seat: SeatId, tier: HealthTier, pos: Position) -> Option<TokenId>;

    /// How many reserve tokens of `tier` the seat still holds.
    fn reserve_count(&self, seat: SeatId, tier: HealthTier) -> u32;

    /// A full snapshot of the game as a JSON document, suitable for
    /// resyncing a client from nothing.
    fn snapshot(&self) -> serde_json::Value;
}

/// Constructs a fresh game state for a given table size. The server
/// holds one builder and calls it once per started lobby.
pub trait GameBuilder: Send + Sync + 'static {
    type State: GameState;

    fn build(&self, player_count: usize) -> Self::State;
}

// ---------------------------------------------------------------------------
// Rule collaborators
// ---------------------------------------------------------------------------

/// Answers where a token may legally move.
pub trait MovementRules<G: GameState> {
    /// All destinations `token` may move to in the current state.
    fn legal_destinations(&self, state: &G, token: &Token) -> HashSet<Position>;
}

/// Answers whether and how an attack resolves.
pub trait CombatRules {
    /// Returns `true` if the attacker is in range of the defender.
    fn are_adjacent(&self, attacker: &Token, defender: &Token) -> bool;

    /// Computes the outcome of the attack. Pure; the pipeline applies it.
    fn resolve(&self, attacker: &Token, defender: &Token) -> CombatOutcome;
}

/// Picks the effect a mystery cell has on an arriving token.
pub trait MysteryRules<G: GameState> {
    fn trigger(&self, board: &G::Board, token: &Token, seat: SeatId) -> MysteryOutcome;
}

/// Answers where a seat may deploy reserve tokens.
pub trait DeploymentRules<G: GameState> {
    /// The seat's deployment zone, independent of current occupancy.
    fn valid_deploy_cells(&self, board: &G::Board, seat: SeatId) -> HashSet<Position>;
}

/// The full bundle of rule collaborators a game provides.
pub trait Ruleset<G: GameState>:
    MovementRules<G> + CombatRules + MysteryRules<G> + DeploymentRules<G> + Send + Sync + 'static
{
}

impl<G: GameState, T> Ruleset<G> for T where
    T: MovementRules<G>
        + CombatRules
        + MysteryRules<G>
        + DeploymentRules<G>
        + Send
        + Sync
        + 'static
{
}

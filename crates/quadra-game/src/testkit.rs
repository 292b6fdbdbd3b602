//! A minimal square-grid game used by the workspace test suites.
//!
//! This is not the shipped game: it implements just enough board
//! geometry and rule behavior to exercise the pipeline, the session
//! layer and the server end to end. Enabled with the `testkit` feature
//! or under `cfg(test)`.

use std::collections::{HashMap, HashSet};

use quadra_protocol::{HealthTier, Position, TokenId};
use serde_json::json;

use crate::state::{
    Board, CombatRules, DeploymentRules, GameBuilder, GameState, MovementRules, MysteryRules,
};
use crate::types::{CellKind, CombatOutcome, GamePhase, MysteryOutcome, SeatId, Token, TurnPhase};

/// Side length of the square test board.
pub const BOARD_SIZE: i32 = 8;

/// Reserve counts each seat starts with, lowest tier first.
const STARTING_RESERVES: [u32; 4] = [2, 2, 1, 1];

fn tier_index(tier: HealthTier) -> usize {
    match tier {
        HealthTier::Ten => 0,
        HealthTier::Twenty => 1,
        HealthTier::Thirty => 2,
        HealthTier::Forty => 3,
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A square grid with optional mystery cells.
pub struct GridBoard {
    size: i32,
    mystery: HashSet<Position>,
    occupants: HashMap<Position, TokenId>,
}

impl GridBoard {
    fn new(size: i32) -> Self {
        Self {
            size,
            mystery: HashSet::new(),
            occupants: HashMap::new(),
        }
    }
}

impl Board for GridBoard {
    fn is_valid_position(&self, pos: Position) -> bool {
        (0..self.size).contains(&pos.x) && (0..self.size).contains(&pos.y)
    }

    fn cell_kind(&self, pos: Position) -> Option<CellKind> {
        if !self.is_valid_position(pos) {
            return None;
        }
        if self.mystery.contains(&pos) {
            Some(CellKind::Mystery)
        } else {
            Some(CellKind::Normal)
        }
    }

    fn occupant(&self, pos: Position) -> Option<TokenId> {
        self.occupants.get(&pos).copied()
    }

    fn set_occupant(&mut self, pos: Position, token: TokenId) {
        self.occupants.insert(pos, token);
    }

    fn clear_occupant(&mut self, pos: Position) {
        self.occupants.remove(&pos);
    }
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

struct SeatSlot {
    name: String,
    reserves: [u32; 4],
}

/// In-memory game state over a [`GridBoard`].
pub struct GridState {
    board: GridBoard,
    tokens: HashMap<TokenId, Token>,
    seats: Vec<SeatSlot>,
    current: SeatId,
    turn_phase: TurnPhase,
    turn_number: u32,
    phase: GamePhase,
    winner: Option<SeatId>,
    next_token_id: u32,
}

impl GridState {
    pub fn new(player_count: usize) -> Self {
        let seats = (0..player_count)
            .map(|_| SeatSlot {
                name: String::new(),
                reserves: STARTING_RESERVES,
            })
            .collect();
        Self {
            board: GridBoard::new(BOARD_SIZE),
            tokens: HashMap::new(),
            seats,
            current: SeatId(0),
            turn_phase: TurnPhase::Movement,
            turn_number: 1,
            phase: GamePhase::Setup,
            winner: None,
            next_token_id: 1,
        }
    }

    /// Marks the given cells as mystery cells.
    pub fn with_mystery_cells(mut self, cells: &[Position]) -> Self {
        self.board.mystery.extend(cells.iter().copied());
        self
    }

    /// Places a token directly, bypassing deploy rules. Test setup only.
    pub fn place_token(&mut self, seat: SeatId, health: u32, pos: Position) -> TokenId {
        let id = TokenId(self.next_token_id);
        self.next_token_id += 1;
        self.tokens.insert(
            id,
            Token {
                id,
                owner: seat,
                health,
                position: Some(pos),
            },
        );
        self.board.set_occupant(pos, id);
        id
    }

    /// Overrides a seat's reserve count for one tier. Test setup only.
    pub fn set_reserve(&mut self, seat: SeatId, tier: HealthTier, count: u32) {
        self.seats[seat.index()].reserves[tier_index(tier)] = count;
    }

    /// A seat still has material if any of its tokens is alive on the
    /// board or any reserve tier is non-empty.
    fn has_material(&self, seat: SeatId) -> bool {
        let in_play = self
            .tokens
            .values()
            .any(|t| t.owner == seat && t.is_alive() && t.is_deployed());
        in_play || self.seats[seat.index()].reserves.iter().any(|&n| n > 0)
    }

    fn refresh_winner(&mut self) {
        if self.phase != GamePhase::Playing {
            return;
        }
        let alive: Vec<SeatId> = (0..self.seats.len())
            .map(|i| SeatId(i as u8))
            .filter(|&s| self.has_material(s))
            .collect();
        if alive.len() == 1 {
            self.winner = Some(alive[0]);
            self.phase = GamePhase::Finished;
        }
    }
}

impl GameState for GridState {
    type Board = GridBoard;

    fn board(&self) -> &GridBoard {
        &self.board
    }

    fn board_mut(&mut self) -> &mut GridBoard {
        &mut self.board
    }

    fn begin(&mut self) {
        self.phase = GamePhase::Playing;
    }

    fn token(&self, id: TokenId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    fn remove_token(&mut self, id: TokenId) {
        self.tokens.remove(&id);
        self.refresh_winner();
    }

    fn set_token_health(&mut self, id: TokenId, health: u32) {
        if let Some(token) = self.tokens.get_mut(&id) {
            token.health = health;
        }
    }

    fn set_token_position(&mut self, id: TokenId, pos: Position) {
        if let Some(token) = self.tokens.get_mut(&id) {
            token.position = Some(pos);
        }
    }

    fn player_name(&self, seat: SeatId) -> Option<String> {
        let slot = self.seats.get(seat.index())?;
        if slot.name.is_empty() {
            None
        } else {
            Some(slot.name.clone())
        }
    }

    fn set_player_name(&mut self, seat: SeatId, name: &str) {
        if let Some(slot) = self.seats.get_mut(seat.index()) {
            slot.name = name.to_string();
        }
    }

    fn phase(&self) -> GamePhase {
        self.phase
    }

    fn winner(&self) -> Option<SeatId> {
        self.winner
    }

    fn current_turn(&self) -> SeatId {
        self.current
    }

    fn turn_phase(&self) -> TurnPhase {
        self.turn_phase
    }

    fn set_turn_phase(&mut self, phase: TurnPhase) {
        self.turn_phase = phase;
    }

    fn turn_number(&self) -> u32 {
        self.turn_number
    }

    fn end_turn(&mut self) -> (SeatId, u32) {
        let next = (self.current.index() + 1) % self.seats.len();
        self.current = SeatId(next as u8);
        self.turn_phase = TurnPhase::Movement;
        self.turn_number += 1;
        (self.current, self.turn_number)
    }

    fn move_token(&mut self, id: TokenId, dest: Position) -> bool {
        if !self.board.is_valid_position(dest) || self.board.occupant(dest).is_some() {
            return false;
        }
        let Some(from) = self.tokens.get(&id).and_then(|t| t.position) else {
            return false;
        };
        self.board.clear_occupant(from);
        self.board.set_occupant(dest, id);
        self.set_token_position(id, dest);
        true
    }

    fn deploy_token(&mut self, seat: SeatId, tier: HealthTier, pos: Position) -> Option<TokenId> {
        if !self.board.is_valid_position(pos) || self.board.occupant(pos).is_some() {
            return None;
        }
        let slot = self.seats.get_mut(seat.index())?;
        let count = &mut slot.reserves[tier_index(tier)];
        if *count == 0 {
            return None;
        }
        *count -= 1;
        Some(self.place_token(seat, tier.value(), pos))
    }

    fn reserve_count(&self, seat: SeatId, tier: HealthTier) -> u32 {
        self.seats
            .get(seat.index())
            .map_or(0, |s| s.reserves[tier_index(tier)])
    }

    fn snapshot(&self) -> serde_json::Value {
        let mut tokens: Vec<&Token> = self.tokens.values().collect();
        tokens.sort_by_key(|t| t.id.0);
        let players: Vec<_> = self
            .seats
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let reserves: Vec<_> = HealthTier::ALL
                    .iter()
                    .map(|&tier| {
                        json!({
                            "tier": tier.value(),
                            "count": slot.reserves[tier_index(tier)],
                        })
                    })
                    .collect();
                json!({ "seat": i, "name": slot.name, "reserves": reserves })
            })
            .collect();

        json!({
            "board_size": self.board.size,
            "phase": self.phase,
            "turn_number": self.turn_number,
            "turn_phase": self.turn_phase,
            "current_turn": self.current,
            "winner": self.winner,
            "players": players,
            "tokens": tokens,
        })
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// How the test rules resolve a mystery cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MysteryBehavior {
    /// Coin flip between heal and teleport.
    Random,
    AlwaysHeal,
    AlwaysTeleportTo(Position),
}

/// Rule collaborators for [`GridState`]: single-step orthogonal
/// movement, manhattan adjacency, half-health damage and corner
/// deployment zones.
pub struct GridRules {
    mystery: MysteryBehavior,
}

impl GridRules {
    pub fn new() -> Self {
        Self {
            mystery: MysteryBehavior::Random,
        }
    }

    pub fn with_mystery(mut self, behavior: MysteryBehavior) -> Self {
        self.mystery = behavior;
        self
    }
}

impl Default for GridRules {
    fn default() -> Self {
        Self::new()
    }
}

fn neighbors(pos: Position) -> [Position; 4] {
    [
        Position::new(pos.x + 1, pos.y),
        Position::new(pos.x - 1, pos.y),
        Position::new(pos.x, pos.y + 1),
        Position::new(pos.x, pos.y - 1),
    ]
}

impl MovementRules<GridState> for GridRules {
    fn legal_destinations(&self, state: &GridState, token: &Token) -> HashSet<Position> {
        let Some(from) = token.position else {
            return HashSet::new();
        };
        neighbors(from)
            .into_iter()
            .filter(|&p| state.board().is_valid_position(p) && state.board().occupant(p).is_none())
            .collect()
    }
}

impl CombatRules for GridRules {
    fn are_adjacent(&self, attacker: &Token, defender: &Token) -> bool {
        match (attacker.position, defender.position) {
            (Some(a), Some(d)) => (a.x - d.x).abs() + (a.y - d.y).abs() == 1,
            _ => false,
        }
    }

    fn resolve(&self, attacker: &Token, defender: &Token) -> CombatOutcome {
        let damage = attacker.health / 2;
        let killed = damage >= defender.health;
        CombatOutcome {
            damage,
            defender_health: defender.health.saturating_sub(damage),
            killed,
        }
    }
}

impl MysteryRules<GridState> for GridRules {
    fn trigger(&self, board: &GridBoard, token: &Token, _seat: SeatId) -> MysteryOutcome {
        let heal = || MysteryOutcome::Heal {
            old_health: token.health,
            new_health: (token.health + 10).min(40),
        };
        match self.mystery {
            MysteryBehavior::AlwaysHeal => heal(),
            MysteryBehavior::AlwaysTeleportTo(pos) => MysteryOutcome::Teleport {
                new_position: pos,
            },
            MysteryBehavior::Random => {
                if rand::random::<bool>() {
                    return heal();
                }
                // First free cell, scanning row by row. Falls back to a
                // heal on a full board.
                for x in 0..board.size {
                    for y in 0..board.size {
                        let pos = Position::new(x, y);
                        if board.occupant(pos).is_none() {
                            return MysteryOutcome::Teleport { new_position: pos };
                        }
                    }
                }
                heal()
            }
        }
    }
}

impl DeploymentRules<GridState> for GridRules {
    fn valid_deploy_cells(&self, board: &GridBoard, seat: SeatId) -> HashSet<Position> {
        let last = board.size - 1;
        let corner = match seat.index() % 4 {
            0 => Position::new(0, 0),
            1 => Position::new(last, last),
            2 => Position::new(0, last),
            _ => Position::new(last, 0),
        };
        let mut zone: HashSet<Position> = neighbors(corner)
            .into_iter()
            .filter(|&p| board.is_valid_position(p))
            .collect();
        zone.insert(corner);
        zone
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds a fresh [`GridState`] per started game.
pub struct GridBuilder;

impl GameBuilder for GridBuilder {
    type State = GridState;

    fn build(&self, player_count: usize) -> GridState {
        GridState::new(player_count)
    }
}

// =========================================================================
// Tests
// =========================================================================

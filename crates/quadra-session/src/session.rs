//! One running game: externally-built state plus the seat map.

use quadra_game::{ActionResult, GamePhase, GameState, Ruleset, SeatId, execute_action};
use quadra_protocol::{Action, LobbyId, PlayerId};

use crate::SeatMap;

/// A running game session.
///
/// Wraps the externally-owned game state and the identity↔seat map.
/// The coordinator hands sessions out behind a `tokio::sync::Mutex`,
/// which is what guarantees at most one action is in flight against
/// this state at any instant.
pub struct GameSession<G: GameState> {
    id: LobbyId,
    state: G,
    seats: SeatMap,
}

impl<G: GameState> GameSession<G> {
    pub(crate) fn new(id: LobbyId, state: G, seats: SeatMap) -> Self {
        Self { id, state, seats }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn state(&self) -> &G {
        &self.state
    }

    pub fn seat_of(&self, player: &PlayerId) -> Option<SeatId> {
        self.seats.seat_of(player)
    }

    pub fn player_at(&self, seat: SeatId) -> Option<&PlayerId> {
        self.seats.player_at(seat)
    }

    /// Member identities in seat order.
    pub fn players(&self) -> &[PlayerId] {
        self.seats.players()
    }

    /// Resolves the acting player's seat and runs the pipeline.
    ///
    /// The caller must hold this session's lock for the whole call.
    pub fn execute<R: Ruleset<G>>(
        &mut self,
        rules: &R,
        player: &PlayerId,
        action: &Action,
    ) -> ActionResult {
        let Some(seat) = self.seats.seat_of(player) else {
            return ActionResult::fail(format!("player {player} is not seated in this game"));
        };
        execute_action(&mut self.state, rules, seat, action)
    }

    /// A full serialized snapshot for resyncing one client.
    pub fn snapshot(&self) -> serde_json::Value {
        self.state.snapshot()
    }

    pub fn is_over(&self) -> bool {
        self.state.phase() == GamePhase::Finished
    }

    /// The winner as a network identity, once the game is over.
    pub fn winner(&self) -> Option<&PlayerId> {
        self.state.winner().and_then(|seat| self.seats.player_at(seat))
    }
}

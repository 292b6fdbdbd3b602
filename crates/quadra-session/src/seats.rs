//! The bidirectional mapping between network identities and seats.
//!
//! A player's network identity survives reconnects; the seat is what
//! the game state knows them by. The session owns this mapping — the
//! lobby never does.

use std::collections::HashMap;

use quadra_game::SeatId;
use quadra_protocol::PlayerId;

/// Identity ↔ seat map for one game session.
///
/// Seats are assigned densely in the order identities are added, so
/// assigning the lobby roster in join order reproduces the lobby's
/// seat indices exactly.
#[derive(Debug, Default)]
pub struct SeatMap {
    by_player: HashMap<PlayerId, SeatId>,
    /// Seat index → identity; position in the vec IS the seat.
    by_seat: Vec<PlayerId>,
}

impl SeatMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next free seat to `player` and returns it.
    pub fn assign(&mut self, player: PlayerId) -> SeatId {
        let seat = SeatId(self.by_seat.len() as u8);
        self.by_player.insert(player.clone(), seat);
        self.by_seat.push(player);
        seat
    }

    pub fn seat_of(&self, player: &PlayerId) -> Option<SeatId> {
        self.by_player.get(player).copied()
    }

    pub fn player_at(&self, seat: SeatId) -> Option<&PlayerId> {
        self.by_seat.get(seat.index())
    }

    /// Identities in seat order.
    pub fn players(&self) -> &[PlayerId] {
        &self.by_seat
    }

    pub fn len(&self) -> usize {
        self.by_seat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seat.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

//! The game coordinator: promotes lobbies to sessions and routes
//! players to them.
//!
//! # Concurrency note
//!
//! The coordinator itself is a plain map owned by the server behind one
//! lock; each session it hands out sits behind its own
//! `tokio::sync::Mutex`. Routing looks up the session under the
//! coordinator lock, releases it, then locks just that session to
//! execute — so actions in different games run freely in parallel
//! while actions against one game apply strictly one at a time, in
//! arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use quadra_game::{GameBuilder, GameState};
use quadra_lobby::GameLobby;
use quadra_protocol::{LobbyId, PlayerId};
use tokio::sync::Mutex;

use crate::{GameSession, SeatMap, SessionError};

/// A shared handle to one session's lock.
pub type SharedSession<G> = Arc<Mutex<GameSession<G>>>;

/// Creates and tracks all running game sessions.
pub struct GameCoordinator<B: GameBuilder> {
    builder: B,
    sessions: HashMap<LobbyId, SharedSession<B::State>>,
    /// Index from identity to the game it is playing in.
    player_games: HashMap<PlayerId, LobbyId>,
}

impl<B: GameBuilder> GameCoordinator<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            sessions: HashMap::new(),
            player_games: HashMap::new(),
        }
    }

    /// Promotes a started lobby into a running game session.
    ///
    /// Seats are assigned in join order, display names are copied into
    /// the game state, and the state is asked to begin (initial token
    /// placement is the game's concern, not ours).
    pub fn create_game(
        &mut self,
        lobby: &GameLobby,
    ) -> Result<SharedSession<B::State>, SessionError> {
        let id = lobby.id();
        if self.sessions.contains_key(&id) {
            return Err(SessionError::GameExists(id));
        }
        for member in lobby.members() {
            if let Some(existing) = self.player_games.get(&member.player_id) {
                return Err(SessionError::AlreadyInGame(
                    member.player_id.clone(),
                    *existing,
                ));
            }
        }

        let mut state = self.builder.build(lobby.len());
        let mut seats = SeatMap::new();
        for member in lobby.members() {
            let seat = seats.assign(member.player_id.clone());
            state.set_player_name(seat, &member.name);
        }
        state.begin();

        for member in lobby.members() {
            self.player_games.insert(member.player_id.clone(), id);
        }
        let session = Arc::new(Mutex::new(GameSession::new(id, state, seats)));
        self.sessions.insert(id, Arc::clone(&session));
        tracing::info!(game_id = %id, players = lobby.len(), "game session created");
        Ok(session)
    }

    /// Looks up a session by game ID.
    pub fn session(&self, id: LobbyId) -> Option<SharedSession<B::State>> {
        self.sessions.get(&id).cloned()
    }

    /// Looks up the session a player is in, with its game ID.
    pub fn session_for(
        &self,
        player: &PlayerId,
    ) -> Option<(LobbyId, SharedSession<B::State>)> {
        let id = *self.player_games.get(player)?;
        Some((id, self.sessions.get(&id)?.clone()))
    }

    /// Which game a player is in, if any.
    pub fn game_of(&self, player: &PlayerId) -> Option<LobbyId> {
        self.player_games.get(player).copied()
    }

    /// Drops a player's game mapping. Their seat stays in the session,
    /// they just can no longer be routed to it.
    pub fn remove_player(&mut self, player: &PlayerId) {
        if let Some(id) = self.player_games.remove(player) {
            tracing::info!(game_id = %id, %player, "player removed from game index");
        }
    }

    /// Tears down a finished game and every mapping into it.
    pub fn end_game(&mut self, id: LobbyId) -> Option<SharedSession<B::State>> {
        let session = self.sessions.remove(&id)?;
        self.player_games.retain(|_, game| *game != id);
        tracing::info!(game_id = %id, "game session ended");
        Some(session)
    }

    pub fn game_count(&self) -> usize {
        self.sessions.len()
    }
}

// =========================================================================
// Tests
// =========================================================================

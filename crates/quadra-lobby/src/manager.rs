//! Lobby manager: creates, tracks and mutates lobbies, and enforces
//! the one-lobby-per-player invariant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use quadra_protocol::{ClientKind, LobbyId, PlayerId};

use crate::lobby::validate_name;
use crate::{GameLobby, LobbyConfig, LobbyError, PlayerInfo};

/// Counter for generating unique lobby IDs.
static NEXT_LOBBY_ID: AtomicU64 = AtomicU64::new(1);

/// What a leave did, in enough detail for the caller to notify peers.
#[derive(Debug)]
pub struct LeaveOutcome {
    pub lobby_id: LobbyId,
    /// The removed member, including the display name peers know.
    pub player: PlayerInfo,
    /// `true` if the lobby emptied out and was deleted.
    pub lobby_deleted: bool,
    /// Set when the host left and the role moved to another member.
    pub new_host: Option<PlayerId>,
}

/// Manages all lobbies and tracks which player is in which lobby.
///
/// All roster mutation goes through here; nothing else touches a
/// lobby's member list. A player can be in at most ONE lobby at a time.
pub struct LobbyManager {
    lobbies: HashMap<LobbyId, GameLobby>,
    player_lobbies: HashMap<PlayerId, LobbyId>,
}

impl LobbyManager {
    pub fn new() -> Self {
        Self {
            lobbies: HashMap::new(),
            player_lobbies: HashMap::new(),
        }
    }

    /// Creates a lobby with the host as its sole, not-yet-ready member.
    pub fn create(
        &mut self,
        host: PlayerId,
        host_name: &str,
        lobby_name: &str,
        kind: ClientKind,
        config: LobbyConfig,
    ) -> Result<LobbyId, LobbyError> {
        validate_name(host_name)?;
        validate_name(lobby_name)?;
        if let Some(existing) = self.player_lobbies.get(&host) {
            return Err(LobbyError::AlreadyInLobby(host, *existing));
        }

        let id = LobbyId(NEXT_LOBBY_ID.fetch_add(1, Ordering::Relaxed));
        let lobby = GameLobby::new(
            id,
            lobby_name.to_string(),
            host.clone(),
            host_name.to_string(),
            kind,
            config,
        );
        self.lobbies.insert(id, lobby);
        self.player_lobbies.insert(host, id);
        tracing::info!(lobby_id = %id, name = lobby_name, "lobby created");
        Ok(id)
    }

    /// Adds a player to a lobby. Returns the assigned seat index.
    pub fn join(
        &mut self,
        lobby_id: LobbyId,
        player: PlayerId,
        name: &str,
        kind: ClientKind,
    ) -> Result<usize, LobbyError> {
        validate_name(name)?;
        if let Some(existing) = self.player_lobbies.get(&player) {
            return Err(LobbyError::AlreadyInLobby(player, *existing));
        }

        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;
        let seat = lobby
            .add_member(player.clone(), name.to_string(), kind)?
            .seat;
        self.player_lobbies.insert(player.clone(), lobby_id);
        tracing::info!(%lobby_id, %player, seat, "player joined lobby");
        Ok(seat)
    }

    /// Removes a player from their lobby, deleting the lobby if it
    /// empties out.
    pub fn leave(&mut self, player: &PlayerId) -> Result<LeaveOutcome, LobbyError> {
        let lobby_id = self
            .player_lobbies
            .get(player)
            .copied()
            .ok_or_else(|| LobbyError::NotInLobby(player.clone()))?;
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;

        let was_host = lobby.host() == player;
        let removed = lobby.remove_member(player)?;
        self.player_lobbies.remove(player);

        let lobby_deleted = lobby.is_empty();
        let new_host = if lobby_deleted {
            None
        } else if was_host {
            Some(lobby.host().clone())
        } else {
            None
        };
        if lobby_deleted {
            self.lobbies.remove(&lobby_id);
            tracing::info!(%lobby_id, "lobby emptied, deleted");
        }
        tracing::info!(%lobby_id, %player, "player left lobby");

        Ok(LeaveOutcome {
            lobby_id,
            player: removed,
            lobby_deleted,
            new_host,
        })
    }

    /// Sets a member's ready flag. Returns the lobby affected.
    pub fn set_ready(
        &mut self,
        player: &PlayerId,
        ready: bool,
    ) -> Result<LobbyId, LobbyError> {
        let lobby_id = self
            .player_lobbies
            .get(player)
            .copied()
            .ok_or_else(|| LobbyError::NotInLobby(player.clone()))?;
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;
        lobby.set_ready(player, ready)?;
        Ok(lobby_id)
    }

    /// Runs the start gate. On success the lobby is Starting; a later
    /// [`Self::mark_in_progress`] records that the session exists.
    pub fn start(&mut self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        let lobby = self
            .lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?;
        lobby.start()?;
        tracing::info!(%lobby_id, players = lobby.len(), "lobby starting");
        Ok(())
    }

    pub fn mark_in_progress(&mut self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        self.lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?
            .mark_in_progress()
    }

    /// Marks the lobby's game as over.
    pub fn finish(&mut self, lobby_id: LobbyId) -> Result<(), LobbyError> {
        self.lobbies
            .get_mut(&lobby_id)
            .ok_or(LobbyError::NotFound(lobby_id))?
            .finish();
        Ok(())
    }

    /// Deletes a lobby outright, clearing every member's index entry.
    pub fn remove(&mut self, lobby_id: LobbyId) -> Option<GameLobby> {
        let lobby = self.lobbies.remove(&lobby_id)?;
        self.player_lobbies.retain(|_, id| *id != lobby_id);
        tracing::info!(%lobby_id, "lobby removed");
        Some(lobby)
    }

    pub fn get(&self, lobby_id: LobbyId) -> Option<&GameLobby> {
        self.lobbies.get(&lobby_id)
    }

    /// The lobby a player currently belongs to, if any.
    pub fn lobby_of(&self, player: &PlayerId) -> Option<LobbyId> {
        self.player_lobbies.get(player).copied()
    }

    pub fn get_for_player(&self, player: &PlayerId) -> Option<&GameLobby> {
        self.lobbies.get(self.player_lobbies.get(player)?)
    }

    /// Lobbies that are Waiting and still have free capacity, in
    /// ascending ID order for deterministic listings.
    pub fn list(&self) -> Vec<&GameLobby> {
        let mut open: Vec<&GameLobby> = self
            .lobbies
            .values()
            .filter(|l| l.status().is_joinable() && l.has_capacity())
            .collect();
        open.sort_by_key(|l| l.id());
        open
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }
}

impl Default for LobbyManager {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================

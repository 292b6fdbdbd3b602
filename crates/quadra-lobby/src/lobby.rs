//! The lobby aggregate: a join-ordered roster with a host and a
//! lifecycle status.

use quadra_protocol::{ClientKind, LobbyId, PlayerId};
use serde::{Deserialize, Serialize};

use crate::{LobbyConfig, LobbyError, LobbyStatus};

/// Longest accepted display or lobby name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Validates a display or lobby name.
///
/// Rejected outright: empty, longer than [`MAX_NAME_LEN`], control
/// characters, leading or trailing whitespace. Never truncates.
pub fn validate_name(name: &str) -> Result<(), LobbyError> {
    if name.is_empty() {
        return Err(LobbyError::InvalidName("name is empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(LobbyError::InvalidName(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(LobbyError::InvalidName(
            "name contains control characters".into(),
        ));
    }
    if name.trim() != name {
        return Err(LobbyError::InvalidName(
            "name has leading or trailing whitespace".into(),
        ));
    }
    Ok(())
}

/// One member of a lobby roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: PlayerId,
    pub name: String,
    pub kind: ClientKind,
    pub ready: bool,
    /// Seat index. Always equals the member's position in join order;
    /// recomputed whenever someone leaves.
    pub seat: usize,
}

/// A pre-game matchmaking lobby.
///
/// The roster is kept in join order; seat indices are dense `0..n`.
/// An empty lobby is deleted by the manager, never kept around.
#[derive(Debug, Clone)]
pub struct GameLobby {
    id: LobbyId,
    name: String,
    host: PlayerId,
    roster: Vec<PlayerInfo>,
    config: LobbyConfig,
    status: LobbyStatus,
}

impl GameLobby {
    pub(crate) fn new(
        id: LobbyId,
        name: String,
        host: PlayerId,
        host_name: String,
        kind: ClientKind,
        config: LobbyConfig,
    ) -> Self {
        let roster = vec![PlayerInfo {
            player_id: host.clone(),
            name: host_name,
            kind,
            ready: false,
            seat: 0,
        }];
        Self {
            id,
            name,
            host,
            roster,
            config,
            status: LobbyStatus::Waiting,
        }
    }

    pub fn id(&self) -> LobbyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &PlayerId {
        &self.host
    }

    pub fn status(&self) -> LobbyStatus {
        self.status
    }

    pub fn config(&self) -> LobbyConfig {
        self.config
    }

    /// The roster in join order.
    pub fn members(&self) -> &[PlayerInfo] {
        &self.roster
    }

    pub fn member(&self, player: &PlayerId) -> Option<&PlayerInfo> {
        self.roster.iter().find(|p| &p.player_id == player)
    }

    pub fn seat_of(&self, player: &PlayerId) -> Option<usize> {
        self.member(player).map(|p| p.seat)
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn has_capacity(&self) -> bool {
        self.roster.len() < self.config.max_players
    }

    /// Member identities in roster (seat) order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.roster.iter().map(|p| p.player_id.clone()).collect()
    }

    pub(crate) fn add_member(
        &mut self,
        player: PlayerId,
        name: String,
        kind: ClientKind,
    ) -> Result<&PlayerInfo, LobbyError> {
        if !self.status.is_joinable() {
            return Err(LobbyError::InvalidState(format!(
                "cannot join lobby {} in state {}",
                self.id, self.status
            )));
        }
        if self.member(&player).is_some() {
            return Err(LobbyError::AlreadyInLobby(player, self.id));
        }
        if !self.has_capacity() {
            return Err(LobbyError::Full(self.id));
        }

        let seat = self.roster.len();
        self.roster.push(PlayerInfo {
            player_id: player,
            name,
            kind,
            ready: false,
            seat,
        });
        Ok(&self.roster[seat])
    }

    /// Removes a member, compacts seats and transfers the host role to
    /// the earliest remaining joiner if the host left.
    pub(crate) fn remove_member(
        &mut self,
        player: &PlayerId,
    ) -> Result<PlayerInfo, LobbyError> {
        let idx = self
            .roster
            .iter()
            .position(|p| &p.player_id == player)
            .ok_or_else(|| LobbyError::NotInLobby(player.clone()))?;
        let removed = self.roster.remove(idx);

        for (i, member) in self.roster.iter_mut().enumerate() {
            member.seat = i;
        }
        if self.host == removed.player_id {
            if let Some(next_host) = self.roster.first() {
                self.host = next_host.player_id.clone();
            }
        }
        Ok(removed)
    }

    pub(crate) fn set_ready(
        &mut self,
        player: &PlayerId,
        ready: bool,
    ) -> Result<(), LobbyError> {
        let member = self
            .roster
            .iter_mut()
            .find(|p| &p.player_id == player)
            .ok_or_else(|| LobbyError::NotInLobby(player.clone()))?;
        member.ready = ready;
        Ok(())
    }

    /// The start gate: Waiting, enough players, everyone ready. On
    /// failure nothing changes; on success the status becomes Starting.
    pub(crate) fn start(&mut self) -> Result<(), LobbyError> {
        if self.status != LobbyStatus::Waiting {
            return Err(LobbyError::CannotStart(
                self.id,
                format!("status is {}", self.status),
            ));
        }
        if self.roster.len() < self.config.min_players {
            return Err(LobbyError::CannotStart(
                self.id,
                format!(
                    "{} of {} required players",
                    self.roster.len(),
                    self.config.min_players
                ),
            ));
        }
        if let Some(unready) = self.roster.iter().find(|p| !p.ready) {
            return Err(LobbyError::CannotStart(
                self.id,
                format!("{} is not ready", unready.name),
            ));
        }
        self.status = LobbyStatus::Starting;
        Ok(())
    }

    /// Marks the game session as built. Only valid from Starting.
    pub(crate) fn mark_in_progress(&mut self) -> Result<(), LobbyError> {
        if !self.status.can_transition_to(LobbyStatus::InProgress) {
            return Err(LobbyError::InvalidState(format!(
                "lobby {} cannot enter InProgress from {}",
                self.id, self.status
            )));
        }
        self.status = LobbyStatus::InProgress;
        Ok(())
    }

    pub(crate) fn finish(&mut self) {
        self.status = LobbyStatus::Finished;
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> PlayerId {
        PlayerId(format!("player-{n}"))
    }

    fn lobby() -> GameLobby {
        GameLobby::new(
            LobbyId(1),
            "table".into(),
            pid(0),
            "host".into(),
            ClientKind::Human,
            LobbyConfig::default(),
        )
    }

    #[test]
    fn test_validate_name_accepts_plain_names() {
        assert!(validate_name("alice").is_ok());
        assert!(validate_name("Bot 3000").is_ok());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_validate_name_rejects_bad_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name("line\nbreak").is_err());
        assert!(validate_name(" padded").is_err());
        assert!(validate_name("padded ").is_err());
    }

    #[test]
    fn test_seats_stay_dense_across_joins_and_leaves() {
        let mut lobby = lobby();
        lobby.add_member(pid(1), "one".into(), ClientKind::Human).unwrap();
        lobby.add_member(pid(2), "two".into(), ClientKind::Human).unwrap();
        lobby.add_member(pid(3), "three".into(), ClientKind::Automated).unwrap();

        lobby.remove_member(&pid(1)).unwrap();
        let seats: Vec<usize> = lobby.members().iter().map(|p| p.seat).collect();
        assert_eq!(seats, vec![0, 1, 2]);
        assert_eq!(lobby.seat_of(&pid(2)), Some(1));
        assert_eq!(lobby.seat_of(&pid(3)), Some(2));

        lobby.remove_member(&pid(0)).unwrap();
        let seats: Vec<usize> = lobby.members().iter().map(|p| p.seat).collect();
        assert_eq!(seats, vec![0, 1]);
        assert_eq!(lobby.seat_of(&pid(2)), Some(0));
    }

    #[test]
    fn test_host_transfers_to_earliest_remaining_joiner() {
        let mut lobby = lobby();
        lobby.add_member(pid(1), "one".into(), ClientKind::Human).unwrap();
        lobby.add_member(pid(2), "two".into(), ClientKind::Human).unwrap();

        lobby.remove_member(&pid(0)).unwrap();
        assert_eq!(lobby.host(), &pid(1));

        lobby.remove_member(&pid(1)).unwrap();
        assert_eq!(lobby.host(), &pid(2));
    }

    #[test]
    fn test_join_rejected_when_full_or_duplicate() {
        let mut lobby = GameLobby::new(
            LobbyId(1),
            "table".into(),
            pid(0),
            "host".into(),
            ClientKind::Human,
            LobbyConfig {
                min_players: 2,
                max_players: 2,
            },
        );
        let dup = lobby.add_member(pid(0), "again".into(), ClientKind::Human);
        assert!(matches!(dup, Err(LobbyError::AlreadyInLobby(..))));

        lobby.add_member(pid(1), "one".into(), ClientKind::Human).unwrap();
        let overflow = lobby.add_member(pid(2), "two".into(), ClientKind::Human);
        assert!(matches!(overflow, Err(LobbyError::Full(_))));
    }

    #[test]
    fn test_start_requires_waiting_min_size_and_all_ready() {
        let mut lobby = lobby();
        let short = lobby.start();
        assert!(matches!(short, Err(LobbyError::CannotStart(..))));
        assert_eq!(lobby.status(), LobbyStatus::Waiting);

        lobby.add_member(pid(1), "one".into(), ClientKind::Human).unwrap();
        lobby.set_ready(&pid(0), true).unwrap();
        let unready = lobby.start();
        assert!(matches!(unready, Err(LobbyError::CannotStart(..))));
        assert_eq!(lobby.status(), LobbyStatus::Waiting);

        lobby.set_ready(&pid(1), true).unwrap();
        lobby.start().unwrap();
        assert_eq!(lobby.status(), LobbyStatus::Starting);

        let again = lobby.start();
        assert!(matches!(again, Err(LobbyError::CannotStart(..))));
    }

    #[test]
    fn test_join_rejected_once_started() {
        let mut lobby = lobby();
        lobby.add_member(pid(1), "one".into(), ClientKind::Human).unwrap();
        lobby.set_ready(&pid(0), true).unwrap();
        lobby.set_ready(&pid(1), true).unwrap();
        lobby.start().unwrap();

        let late = lobby.add_member(pid(2), "late".into(), ClientKind::Human);
        assert!(matches!(late, Err(LobbyError::InvalidState(_))));
    }

    #[test]
    fn test_mark_in_progress_only_from_starting() {
        let mut lobby = lobby();
        assert!(lobby.mark_in_progress().is_err());

        lobby.add_member(pid(1), "one".into(), ClientKind::Human).unwrap();
        lobby.set_ready(&pid(0), true).unwrap();
        lobby.set_ready(&pid(1), true).unwrap();
        lobby.start().unwrap();
        lobby.mark_in_progress().unwrap();
        assert_eq!(lobby.status(), LobbyStatus::InProgress);
    }
}

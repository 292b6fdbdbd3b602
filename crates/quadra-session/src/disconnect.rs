//! Disconnect records and the reconnection grace window.
//!
//! A player who drops while inside a lobby or game is not removed
//! immediately; a record preserves their slot for a bounded window:
//!
//! ```text
//!   drop ──→ recorded ──(claim within window)──→ rebound to new conn
//!               │
//!               └──(window elapses)──→ purged, removed for good
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use quadra_protocol::{LobbyId, PlayerId};

use crate::SessionError;

/// Grace-window configuration.
#[derive(Debug, Clone, Copy)]
pub struct DisconnectConfig {
    /// How long a dropped player's slot is preserved. Default: 300s.
    pub grace: Duration,
}

impl Default for DisconnectConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(300),
        }
    }
}

/// What the server remembers about a dropped player.
#[derive(Debug, Clone)]
pub struct DisconnectedPlayerRecord {
    pub player_id: PlayerId,
    /// When the connection dropped.
    pub since: Instant,
    /// The lobby or game the player was inside at the time.
    pub lobby_id: LobbyId,
    /// `true` if a game session was running, `false` for a lobby.
    pub in_game: bool,
}

/// Tracks every player currently inside their grace window.
pub struct DisconnectRegistry {
    records: HashMap<PlayerId, DisconnectedPlayerRecord>,
    config: DisconnectConfig,
}

impl DisconnectRegistry {
    pub fn new(config: DisconnectConfig) -> Self {
        Self {
            records: HashMap::new(),
            config,
        }
    }

    /// Records a drop. Overwrites any stale record for the identity.
    pub fn record(&mut self, player: PlayerId, lobby_id: LobbyId, in_game: bool) {
        tracing::info!(%player, %lobby_id, in_game, "disconnect recorded, grace window open");
        self.records.insert(
            player.clone(),
            DisconnectedPlayerRecord {
                player_id: player,
                since: Instant::now(),
                lobby_id,
                in_game,
            },
        );
    }

    /// Validates a reconnect attempt and, on success, consumes the
    /// record.
    ///
    /// # Errors
    /// - [`SessionError::NoDisconnectRecord`] — unknown identity.
    /// - [`SessionError::GraceExpired`] — window elapsed; the record is
    ///   purged so the caller must remove the player for good.
    /// - [`SessionError::GameMismatch`] — the supplied game ID is not
    ///   the recorded one. The record is kept.
    pub fn claim(
        &mut self,
        player: &PlayerId,
        game_id: Option<LobbyId>,
    ) -> Result<DisconnectedPlayerRecord, SessionError> {
        let Some(record) = self.records.get(player) else {
            return Err(SessionError::NoDisconnectRecord(player.clone()));
        };
        if record.since.elapsed() >= self.config.grace {
            self.records.remove(player);
            return Err(SessionError::GraceExpired(player.clone()));
        }
        if let Some(supplied) = game_id {
            if supplied != record.lobby_id {
                return Err(SessionError::GameMismatch {
                    expected: record.lobby_id,
                    supplied,
                });
            }
        }
        let record = self.records.remove(player).expect("just checked");
        tracing::info!(%player, lobby_id = %record.lobby_id, "reconnect claimed within grace window");
        Ok(record)
    }

    /// Drains every record whose window has elapsed. The caller removes
    /// those players from lobby and session state, as if they had left.
    pub fn expire_stale(&mut self) -> Vec<DisconnectedPlayerRecord> {
        let grace = self.config.grace;
        let expired: Vec<PlayerId> = self
            .records
            .values()
            .filter(|r| r.since.elapsed() >= grace)
            .map(|r| r.player_id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|p| {
                let record = self.records.remove(p)?;
                tracing::info!(player = %record.player_id, "grace window elapsed, purging");
                Some(record)
            })
            .collect()
    }

    pub fn get(&self, player: &PlayerId) -> Option<&DisconnectedPlayerRecord> {
        self.records.get(player)
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.records.contains_key(player)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

//! Pre-game lobby matchmaking for Quadra.
//!
//! A lobby is a join-ordered roster with a host, a ready flag per
//! member, and a strict lifecycle. All mutation goes through the
//! [`LobbyManager`]; the server holds exactly one of these behind a
//! lock.
//!
//! # Key types
//!
//! - [`LobbyManager`] — creates/deletes lobbies, routes operations
//! - [`GameLobby`] — one matchmaking roster
//! - [`LobbyStatus`] — lifecycle state machine
//! - [`LobbyConfig`] — roster size limits

mod config;
mod error;
mod lobby;
mod manager;

pub use config::{LobbyConfig, LobbyStatus};
pub use error::LobbyError;
pub use lobby::{GameLobby, MAX_NAME_LEN, PlayerInfo, validate_name};
pub use manager::{LeaveOutcome, LobbyManager};

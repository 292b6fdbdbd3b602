//! Core protocol types: identities, the message-kind catalog, and the
//! envelope that every wire message travels in.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A server-assigned opaque identifier for a player.
///
/// Stable for the lifetime of a client's participation — it survives
/// reconnects, unlike the connection ID. Distinct from the seat identity
/// the game state uses internally; the session owns the mapping between
/// the two.
///
/// `#[serde(transparent)]` makes it serialize as the bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Generates a fresh identity: 32 hex characters, 128 bits of entropy.
    pub fn generate() -> Self {
        use rand::Rng;
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a lobby, and for the game session it becomes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

/// What kind of client sits behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// A person at a real client.
    Human,
    /// A bot process (backfill or otherwise).
    Automated,
}

// ---------------------------------------------------------------------------
// MessageKind — the closed catalog
// ---------------------------------------------------------------------------

/// Every message kind the protocol speaks. Closed catalog: an unknown
/// tag on the wire fails to decode rather than passing through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    // Connection lifecycle
    Connect,
    ConnectAck,
    Reconnect,
    ReconnectAck,
    ReconnectFailed,
    Disconnect,
    Heartbeat,
    HeartbeatAck,

    // Lobby
    CreateGame,
    JoinGame,
    LeaveGame,
    ListGames,
    GameList,
    PlayerJoined,
    PlayerLeft,
    PlayerReconnected,
    PlayerDisconnected,
    Ready,
    StartGame,

    // In-game actions
    Move,
    Attack,
    Deploy,
    EndTurn,

    // State sync
    FullState,
    /// Reserved for delta updates.
    StateUpdate,
    TurnChange,

    // Game events
    CombatResult,
    TokenMoved,
    TokenDeployed,
    MysteryEvent,
    GameWon,

    // Chat
    Chat,

    // Errors
    Error,
    InvalidAction,
}

impl MessageKind {
    /// Returns `true` for the four in-game action kinds.
    pub fn is_action(self) -> bool {
        matches!(
            self,
            Self::Move | Self::Attack | Self::Deploy | Self::EndTurn
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Message — the envelope
// ---------------------------------------------------------------------------

/// The top-level wire envelope. Immutable once constructed.
///
/// `data` is a key/value payload whose shape is determined by `kind`;
/// `player_id` is omitted for server-originated broadcasts that have no
/// single addressee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Which catalog entry this is.
    pub kind: MessageKind,

    /// Sender's send time, milliseconds since the Unix epoch.
    pub timestamp: u64,

    /// The originating player, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,

    /// Kind-specific payload. Always a JSON object.
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Milliseconds since the Unix epoch, saturating to zero on a clock
/// before 1970.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Message {
    /// Creates a message of the given kind, stamped with the current time
    /// and an empty payload.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            timestamp: now_millis(),
            player_id: None,
            data: empty_object(),
        }
    }

    /// Sets the originating player (builder-style).
    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    /// Inserts one payload field (builder-style).
    pub fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = &mut self.data {
            map.insert(key.to_string(), value);
        }
        self
    }

    /// Looks up a payload field.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Looks up a payload field as a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    /// Looks up a payload field as an unsigned integer.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.as_u64())
    }

    /// Looks up a payload field as a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_id_generate_is_32_hex_chars() {
        let id = PlayerId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_player_id_generate_is_unique() {
        assert_ne!(PlayerId::generate(), PlayerId::generate());
    }

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId("abc123".into())).unwrap();
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn test_lobby_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&LobbyId(99)).unwrap();
        assert_eq!(json, "99");
    }

    #[test]
    fn test_lobby_id_display() {
        assert_eq!(LobbyId(3).to_string(), "L-3");
    }

    #[test]
    fn test_client_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ClientKind::Human).unwrap(),
            "\"human\""
        );
        assert_eq!(
            serde_json::to_string(&ClientKind::Automated).unwrap(),
            "\"automated\""
        );
    }

    #[test]
    fn test_message_kind_serializes_as_catalog_tag() {
        assert_eq!(
            serde_json::to_string(&MessageKind::ReconnectFailed).unwrap(),
            "\"ReconnectFailed\""
        );
        assert_eq!(
            serde_json::to_string(&MessageKind::EndTurn).unwrap(),
            "\"EndTurn\""
        );
    }

    #[test]
    fn test_message_kind_unknown_tag_fails_to_decode() {
        let result: Result<MessageKind, _> =
            serde_json::from_str("\"FlyToMoon\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_message_kind_is_action() {
        assert!(MessageKind::Move.is_action());
        assert!(MessageKind::Attack.is_action());
        assert!(MessageKind::Deploy.is_action());
        assert!(MessageKind::EndTurn.is_action());
        assert!(!MessageKind::Heartbeat.is_action());
        assert!(!MessageKind::Chat.is_action());
    }

    #[test]
    fn test_message_builder_sets_fields() {
        let msg = Message::new(MessageKind::Chat)
            .with_player(PlayerId("p1".into()))
            .with("text", json!("hello"));

        assert_eq!(msg.kind, MessageKind::Chat);
        assert_eq!(msg.player_id, Some(PlayerId("p1".into())));
        assert_eq!(msg.get_str("text"), Some("hello"));
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_message_round_trip() {
        let msg = Message::new(MessageKind::Ready)
            .with_player(PlayerId("p2".into()))
            .with("ready", json!(true));
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_message_player_id_omitted_when_absent() {
        let msg = Message::new(MessageKind::GameList);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert!(json.get("player_id").is_none());
    }

    #[test]
    fn test_message_data_defaults_to_empty_object() {
        let decoded: Message = serde_json::from_str(
            r#"{"kind": "Heartbeat", "timestamp": 5}"#,
        )
        .unwrap();
        assert_eq!(decoded.data, serde_json::json!({}));
    }

    #[test]
    fn test_message_typed_accessors() {
        let msg = Message::new(MessageKind::Ready)
            .with("flag", json!(true))
            .with("count", json!(7))
            .with("name", json!("quad"));
        assert_eq!(msg.get_bool("flag"), Some(true));
        assert_eq!(msg.get_u64("count"), Some(7));
        assert_eq!(msg.get_str("name"), Some("quad"));
        assert_eq!(msg.get_u64("missing"), None);
    }
}

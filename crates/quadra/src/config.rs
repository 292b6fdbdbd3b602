//! Server configuration.

use std::time::Duration;

use quadra_lobby::LobbyConfig;

/// Tunables for a running server. All have sensible defaults; override
/// through [`QuadraServerBuilder`](crate::QuadraServerBuilder).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP acceptor binds to.
    pub bind_addr: String,

    /// How long a fresh connection gets to send its first message
    /// before the server hangs up. Default: 10s.
    pub handshake_timeout: Duration,

    /// How long a dropped player's lobby and game slot is preserved
    /// for reconnection. Default: 300s.
    pub reconnect_grace: Duration,

    /// How often the server sweeps for expired disconnect records.
    /// Default: 5s.
    pub sweep_interval: Duration,

    /// Roster bounds applied to every created lobby.
    pub lobby: LobbyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".to_string(),
            handshake_timeout: Duration::from_secs(10),
            reconnect_grace: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(5),
            lobby: LobbyConfig::default(),
        }
    }
}

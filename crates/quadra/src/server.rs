//! `QuadraServer` builder and server loop.
//!
//! This is the entry point for running a Quadra game server. It ties
//! together all the layers: transport → protocol → lobby → session →
//! game.

use std::collections::HashMap;
use std::sync::Arc;

use quadra_game::{GameBuilder, Ruleset};
use quadra_lobby::{LobbyConfig, LobbyManager};
use quadra_protocol::{ClientKind, JsonCodec, PlayerId};
use quadra_session::{DisconnectConfig, DisconnectRegistry, GameCoordinator};
use quadra_transport::{ConnectionId, ConnectionPool, TcpAcceptor};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::backfill::{BackfillConfig, BotLauncher, BotManager};
use crate::config::ServerConfig;
use crate::dispatcher::{handle_connection, purge_expired};
use crate::QuadraError;

/// What the server knows about a connected (or grace-window) player.
pub(crate) struct PlayerHandle {
    /// The connection currently bound to this identity. Stale while
    /// the player is inside a reconnection grace window.
    pub(crate) conn_id: ConnectionId,
    pub(crate) kind: ClientKind,
}

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Each
/// subsystem sits behind its own `Mutex`; handlers lock one at a time
/// and never hold a subsystem lock across a broadcast.
pub(crate) struct ServerState<B: GameBuilder, R> {
    pub(crate) config: ServerConfig,
    pub(crate) pool: Mutex<ConnectionPool<TcpStream>>,
    pub(crate) players: Mutex<HashMap<PlayerId, PlayerHandle>>,
    pub(crate) lobbies: Mutex<LobbyManager>,
    pub(crate) games: Mutex<GameCoordinator<B>>,
    pub(crate) disconnects: Mutex<DisconnectRegistry>,
    pub(crate) bots: Mutex<BotManager>,
    pub(crate) rules: R,
    pub(crate) codec: JsonCodec,
    /// The bound address, handed to launched bots so they can connect
    /// back.
    pub(crate) local_addr: String,
}

/// Builder for configuring and starting a Quadra server.
///
/// # Example
///
/// ```rust,ignore
/// let server = QuadraServer::builder()
///     .bind("0.0.0.0:7878")
///     .build(MyGameBuilder, MyRules)
///     .await?;
/// server.run().await
/// ```
pub struct QuadraServerBuilder {
    config: ServerConfig,
    backfill: BackfillConfig,
    launcher: Option<Box<dyn BotLauncher>>,
}

impl QuadraServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            backfill: BackfillConfig::default(),
            launcher: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the handshake deadline for fresh connections.
    pub fn handshake_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the reconnection grace window.
    pub fn reconnect_grace(mut self, grace: std::time::Duration) -> Self {
        self.config.reconnect_grace = grace;
        self
    }

    /// Sets how often expired disconnect records are swept.
    pub fn sweep_interval(mut self, interval: std::time::Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Sets the roster bounds for created lobbies.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.config.lobby = config;
        self
    }

    /// Sets the backfill tunables.
    pub fn backfill_config(mut self, config: BackfillConfig) -> Self {
        self.backfill = config;
        self
    }

    /// Enables bot backfill with the given launcher.
    pub fn bot_launcher(mut self, launcher: impl BotLauncher) -> Self {
        self.launcher = Some(Box::new(launcher));
        self
    }

    /// Binds the listener and assembles the server around the given
    /// game builder and ruleset.
    pub async fn build<B, R>(
        self,
        builder: B,
        rules: R,
    ) -> Result<QuadraServer<B, R>, QuadraError>
    where
        B: GameBuilder,
        R: Ruleset<B::State>,
    {
        let acceptor = TcpAcceptor::bind(&self.config.bind_addr).await?;
        let local_addr = acceptor
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.config.bind_addr.clone());

        let disconnects = DisconnectRegistry::new(DisconnectConfig {
            grace: self.config.reconnect_grace,
        });

        let state = Arc::new(ServerState {
            config: self.config,
            pool: Mutex::new(ConnectionPool::new()),
            players: Mutex::new(HashMap::new()),
            lobbies: Mutex::new(LobbyManager::new()),
            games: Mutex::new(GameCoordinator::new(builder)),
            disconnects: Mutex::new(disconnects),
            bots: Mutex::new(BotManager::new(self.launcher, self.backfill)),
            rules,
            codec: JsonCodec,
            local_addr,
        });

        Ok(QuadraServer { acceptor, state })
    }
}

impl Default for QuadraServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Quadra game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuadraServer<B: GameBuilder, R> {
    acceptor: TcpAcceptor,
    state: Arc<ServerState<B, R>>,
}

impl<B, R> QuadraServer<B, R>
where
    B: GameBuilder,
    R: Ruleset<B::State>,
{
    /// Creates a new builder.
    pub fn builder() -> QuadraServerBuilder {
        QuadraServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.acceptor.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Spawns the disconnect sweeper, then accepts incoming
    /// connections and spawns a handler task for each. Runs until the
    /// process is terminated.
    pub async fn run(self) -> Result<(), QuadraError> {
        tracing::info!(addr = %self.state.local_addr, "Quadra server running");

        let sweeper_state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(sweeper_state.config.sweep_interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                purge_expired(&sweeper_state).await;
            }
        });

        loop {
            match self.acceptor.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Installs a `tracing` subscriber reading the `RUST_LOG` environment
/// variable, defaulting to `info`. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

//! Bot backfill: launching automated players to fill an underfilled
//! table.
//!
//! The server never implements bot play itself; it launches external
//! bot client processes that connect back over the normal TCP protocol
//! and behave like any other player. This module owns the process
//! lifecycle: spawn, stdout draining, and shutdown.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quadra_protocol::LobbyId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;

static NEXT_BOT_ID: AtomicU64 = AtomicU64::new(1);

/// Backfill tunables.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Strategy names handed out round-robin to launched bots.
    pub strategies: Vec<String>,

    /// How long a bot gets to exit on its own after its stdin closes
    /// before it is killed. Default: 2s.
    pub shutdown_timeout: Duration,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                "balanced".to_string(),
                "aggressive".to_string(),
                "defensive".to_string(),
            ],
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

/// Everything a launcher needs to start one bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSpec {
    /// Synthesized display name, unique per process.
    pub name: String,

    /// Strategy the bot should play.
    pub strategy: String,

    /// The lobby the bot must join after connecting.
    pub lobby_id: LobbyId,

    /// Address of this server, for the bot to connect back to.
    pub server_addr: String,
}

/// Launches one bot process.
///
/// Implementations must configure the child with piped stdin and
/// stdout: the manager signals shutdown by closing stdin and drains
/// stdout into the server log.
pub trait BotLauncher: Send + Sync + 'static {
    fn launch(&self, spec: &BotSpec) -> io::Result<Child>;
}

struct TrackedBot {
    name: String,
    child: Child,
}

/// Tracks every bot process launched for every lobby.
pub struct BotManager {
    launcher: Option<Box<dyn BotLauncher>>,
    config: BackfillConfig,
    bots: HashMap<LobbyId, Vec<TrackedBot>>,
    next_strategy: usize,
}

impl BotManager {
    pub fn new(launcher: Option<Box<dyn BotLauncher>>, config: BackfillConfig) -> Self {
        Self {
            launcher,
            config,
            bots: HashMap::new(),
            next_strategy: 0,
        }
    }

    /// `true` if a launcher is configured, so underfilled tables can
    /// be backfilled at all.
    pub fn is_enabled(&self) -> bool {
        self.launcher.is_some()
    }

    /// Launches `count` bots pointed at the given lobby.
    ///
    /// Each bot gets a synthesized unique name and the next strategy in
    /// round-robin order. A launch failure is logged and skipped, so
    /// the return value is how many bots actually started.
    pub fn spawn_for_lobby(&mut self, lobby_id: LobbyId, count: usize, server_addr: &str) -> usize {
        let Some(launcher) = self.launcher.as_ref() else {
            return 0;
        };

        let mut launched = 0;
        for _ in 0..count {
            let name = format!("bot-{}", NEXT_BOT_ID.fetch_add(1, Ordering::Relaxed));
            let strategy = match self.config.strategies.as_slice() {
                [] => "balanced".to_string(),
                strategies => strategies[self.next_strategy % strategies.len()].clone(),
            };
            self.next_strategy += 1;

            let spec = BotSpec {
                name: name.clone(),
                strategy,
                lobby_id,
                server_addr: server_addr.to_string(),
            };
            match launcher.launch(&spec) {
                Ok(mut child) => {
                    if let Some(stdout) = child.stdout.take() {
                        drain_stdout(name.clone(), stdout);
                    }
                    tracing::info!(bot = %name, %lobby_id, strategy = %spec.strategy, "bot launched");
                    self.bots
                        .entry(lobby_id)
                        .or_default()
                        .push(TrackedBot { name, child });
                    launched += 1;
                }
                Err(e) => {
                    tracing::warn!(bot = %name, %lobby_id, error = %e, "bot launch failed");
                }
            }
        }
        launched
    }

    /// How many live bot processes are tracked for a lobby.
    pub fn bot_count(&self, lobby_id: LobbyId) -> usize {
        self.bots.get(&lobby_id).map_or(0, Vec::len)
    }

    /// Shuts down every bot launched for a lobby: close stdin, wait
    /// for a graceful exit, kill on timeout. Bots are untracked only
    /// after their process is confirmed gone.
    pub async fn cleanup_for_lobby(&mut self, lobby_id: LobbyId) {
        let Some(bots) = self.bots.remove(&lobby_id) else {
            return;
        };
        for bot in bots {
            shutdown_bot(bot, self.config.shutdown_timeout).await;
        }
    }

    /// Shuts down every tracked bot across all lobbies.
    pub async fn cleanup_all(&mut self) {
        let lobbies: Vec<LobbyId> = self.bots.keys().copied().collect();
        for lobby_id in lobbies {
            self.cleanup_for_lobby(lobby_id).await;
        }
    }
}

/// Forwards one bot's stdout lines into the server log.
fn drain_stdout(name: String, stdout: tokio::process::ChildStdout) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(bot = %name, "{line}");
        }
    });
}

async fn shutdown_bot(mut bot: TrackedBot, timeout: Duration) {
    // Closing stdin is the graceful shutdown signal.
    drop(bot.child.stdin.take());
    match tokio::time::timeout(timeout, bot.child.wait()).await {
        Ok(Ok(status)) => {
            tracing::debug!(bot = %bot.name, %status, "bot exited");
        }
        Ok(Err(e)) => {
            tracing::warn!(bot = %bot.name, error = %e, "bot wait failed");
        }
        Err(_) => {
            tracing::info!(bot = %bot.name, "bot did not exit in time, killing");
            if let Err(e) = bot.child.kill().await {
                tracing::warn!(bot = %bot.name, error = %e, "bot kill failed");
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

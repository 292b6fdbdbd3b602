//! # Quadra
//!
//! Authoritative server for Quadra, a turn-based tactical board game.
//!
//! The server owns all game truth: clients send requests over a
//! length-prefixed JSON TCP protocol, the server validates them
//! against lobby and game state, and every applied change is broadcast
//! back. A concrete game plugs in through the `quadra-game` traits;
//! this crate supplies the network dispatcher around them.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quadra::{QuadraServer, init_tracing};
//!
//! init_tracing();
//! let server = QuadraServer::builder()
//!     .bind("0.0.0.0:7878")
//!     .build(MyGameBuilder, MyRules)
//!     .await?;
//! server.run().await
//! ```

mod backfill;
mod config;
mod dispatcher;
mod error;
mod server;

pub use backfill::{BackfillConfig, BotLauncher, BotManager, BotSpec};
pub use config::ServerConfig;
pub use error::QuadraError;
pub use server::{init_tracing, QuadraServer, QuadraServerBuilder};

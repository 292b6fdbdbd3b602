//! Game sessions for Quadra.
//!
//! This crate owns everything between the lobby and the game state:
//!
//! 1. **Seat mapping** — network identity ↔ in-game seat ([`SeatMap`])
//! 2. **Sessions** — one running game behind one lock ([`GameSession`])
//! 3. **Coordination** — lobby promotion and player routing
//!    ([`GameCoordinator`])
//! 4. **Reconnect windows** — preserving a dropped player's slot for a
//!    bounded grace period ([`DisconnectRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server dispatcher (above)  ← routes wire messages here
//!     ↕
//! Session layer (this crate) ← owns identity↔seat and the per-game lock
//!     ↕
//! Game layer (below)         ← validates and applies single actions
//! ```

mod coordinator;
mod disconnect;
mod error;
mod seats;
mod session;

pub use coordinator::{GameCoordinator, SharedSession};
pub use disconnect::{DisconnectConfig, DisconnectRegistry, DisconnectedPlayerRecord};
pub use error::SessionError;
pub use seats::SeatMap;
pub use session::GameSession;

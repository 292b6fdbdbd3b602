//! Transport layer for Quadra.
//!
//! Three pieces, leaves first:
//!
//! - [`framing`] — 4-byte big-endian length-prefix framing between raw
//!   bytes and discrete text payloads.
//! - [`Connection`] — one framed, bidirectional channel per remote peer,
//!   with atomic sends and single-reader receives.
//! - [`ConnectionPool`] — the registry of live connections, with
//!   best-effort broadcast.
//!
//! Connections carry opaque text payloads; what those payloads mean is the
//! protocol layer's business.

mod connection;
mod error;
pub mod framing;
mod pool;

pub use connection::{
    Connection, TcpAcceptor, TcpConnection, connect, connect_with_retry,
};
pub use error::TransportError;
pub use framing::{FrameBuffer, FrameResult, decode_frame, encode_frame};
pub use pool::ConnectionPool;

use std::fmt;

/// Opaque identifier for a connection.
///
/// Assigned when the socket is accepted, before any player identity
/// exists; distinct from the player identity, which survives reconnects
/// while the connection ID does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_orders_by_value() {
        assert!(ConnectionId::new(1) < ConnectionId::new(2));
    }
}

//! Unified error type for the Quadra server.

use quadra_lobby::LobbyError;
use quadra_protocol::ProtocolError;
use quadra_session::SessionError;
use quadra_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `quadra` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuadraError {
    /// A transport-level error (connection, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby-level error (full, not found, invalid state).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A session-level error (routing, reconnect, expired grace).
    #[error(transparent)]
    Session(#[from] SessionError),
}

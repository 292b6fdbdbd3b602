//! Wire protocol for Quadra.
//!
//! This crate defines the language clients and the server speak:
//!
//! - **Envelope** ([`Message`], [`MessageKind`]) — every wire message is
//!   a kind tag, a timestamp, an optional originating player, and a
//!   kind-shaped key/value payload.
//! - **Actions** ([`Action`], [`Position`], [`HealthTier`]) — the closed
//!   tagged union of in-game requests and its bidirectional mapping to
//!   wire messages.
//! - **Codec** ([`Codec`], [`JsonCodec`]) — how envelopes become payload
//!   text and back.
//!
//! The protocol layer sits between transport (framed payloads) and the
//! session layer (player context). It knows nothing about connections,
//! lobbies, or game rules.

mod action;
mod codec;
mod error;
mod types;

pub use action::{Action, HealthTier, Position, TokenId};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientKind, LobbyId, Message, MessageKind, PlayerId, now_millis,
};

//! Wire framing: turning a raw byte stream into discrete payloads and back.
//!
//! Each message travels as a fixed-width big-endian length prefix (4 bytes)
//! giving the byte length of the payload, followed by exactly that many
//! UTF-8 bytes. The decoder never blocks and never consumes bytes it cannot
//! yet parse — it is safe to call repeatedly as more bytes arrive.

use crate::TransportError;

/// Width of the length prefix in bytes.
pub const LEN_PREFIX: usize = 4;

/// Upper bound on a single payload. A prefix above this is treated as a
/// corrupt stream rather than an instruction to allocate gigabytes.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// The outcome of one decode attempt against a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameResult {
    /// Not enough bytes for a complete frame. The input must be kept
    /// untouched and retried once more bytes arrive.
    NeedMore,

    /// One complete frame. `consumed` is the number of bytes used;
    /// `buf[consumed..]` is the exact leftover tail, which may itself
    /// contain the start of the next frame.
    Frame { payload: String, consumed: usize },
}

/// Encodes an outgoing payload as a self-delimiting byte sequence.
pub fn encode_frame(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut frame = Vec::with_capacity(LEN_PREFIX + bytes.len());
    frame.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    frame.extend_from_slice(bytes);
    frame
}

/// Extracts the next complete payload from `buf`, if one is present.
///
/// # Errors
/// - [`TransportError::FrameTooLarge`] if the prefix exceeds [`MAX_FRAME_LEN`].
/// - [`TransportError::MalformedFrame`] if the payload is not valid UTF-8.
pub fn decode_frame(buf: &[u8]) -> Result<FrameResult, TransportError> {
    if buf.len() < LEN_PREFIX {
        return Ok(FrameResult::NeedMore);
    }

    let mut prefix = [0u8; LEN_PREFIX];
    prefix.copy_from_slice(&buf[..LEN_PREFIX]);
    let len = u32::from_be_bytes(prefix) as usize;

    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }
    if buf.len() < LEN_PREFIX + len {
        return Ok(FrameResult::NeedMore);
    }

    let payload = std::str::from_utf8(&buf[LEN_PREFIX..LEN_PREFIX + len])
        .map_err(|e| {
            TransportError::MalformedFrame(format!(
                "payload is not valid UTF-8: {e}"
            ))
        })?
        .to_string();

    Ok(FrameResult::Frame {
        payload,
        consumed: LEN_PREFIX + len,
    })
}

/// Accumulates bytes across reads and yields complete payloads.
///
/// The connection layer feeds every chunk it reads into `extend` and then
/// drains frames with `next_frame` until it returns `None`.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes to the buffer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next complete payload, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        match decode_frame(&self.buf)? {
            FrameResult::NeedMore => Ok(None),
            FrameResult::Frame { payload, consumed } => {
                self.buf.drain(..consumed);
                Ok(Some(payload))
            }
        }
    }

    /// Returns `true` if no undecoded bytes remain.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

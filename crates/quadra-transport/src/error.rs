/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// An outbound connection attempt failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The byte stream contained a frame the decoder cannot accept:
    /// a truncated frame at stream end, or a non-UTF-8 payload.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A frame declared a payload larger than the permitted maximum.
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),
}

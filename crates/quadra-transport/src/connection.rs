//! Framed, bidirectional connections over a byte stream.
//!
//! A [`Connection`] owns one stream split into a read half and a write
//! half. Sends frame the payload and write it with a single locked
//! `write_all`, so two concurrent sends can never interleave on the wire.
//! Receives are single-reader: one task drains the stream, anything else
//! is a caller error.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::framing::{FrameBuffer, encode_frame};
use crate::{ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Read buffer size for one `read` call.
const READ_CHUNK: usize = 4096;

struct ReadSide<S> {
    half: ReadHalf<S>,
    frames: FrameBuffer,
}

/// One framed, bidirectional channel to a remote peer.
///
/// Generic over the underlying stream so tests can run over
/// `tokio::io::duplex`; the server uses [`TcpConnection`].
pub struct Connection<S> {
    id: ConnectionId,
    reader: Mutex<ReadSide<S>>,
    writer: Mutex<Option<WriteHalf<S>>>,
    closed: AtomicBool,
}

/// A connection over a real TCP stream.
pub type TcpConnection = Connection<TcpStream>;

impl<S: AsyncRead + AsyncWrite + Send + 'static> Connection<S> {
    /// Wraps a raw stream in a framed connection with a fresh ID.
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            reader: Mutex::new(ReadSide {
                half: read_half,
                frames: FrameBuffer::new(),
            }),
            writer: Mutex::new(Some(write_half)),
            closed: AtomicBool::new(false),
        }
    }

    /// Frames and writes one payload atomically.
    ///
    /// The write lock is held across the whole frame, so a send is never
    /// observably interleaved with another send on this connection.
    pub async fn send(&self, payload: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed(
                "send on closed connection".into(),
            ));
        }

        let frame = encode_frame(payload);
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            TransportError::ConnectionClosed("send on closed connection".into())
        })?;
        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    /// Yields the next fully-framed payload, or `None` at end of stream.
    ///
    /// This is the only reader of the channel. A clean close with a
    /// partial frame still buffered is reported as a malformed frame.
    pub async fn recv(&self) -> Result<Option<String>, TransportError> {
        let mut side = self.reader.lock().await;
        loop {
            if let Some(payload) = side.frames.next_frame()? {
                return Ok(Some(payload));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = side
                .half
                .read(&mut chunk)
                .await
                .map_err(TransportError::ReceiveFailed)?;
            if n == 0 {
                if side.frames.is_empty() {
                    return Ok(None);
                }
                return Err(TransportError::MalformedFrame(
                    "stream ended mid-frame".into(),
                ));
            }
            side.frames.extend(&chunk[..n]);
        }
    }

    /// Closes the connection. Idempotent; releases the write half on
    /// every exit path, including after a send or receive failure.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            let _ = writer.shutdown().await;
        }
        tracing::debug!(id = %self.id, "connection closed");
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Accepts incoming framed TCP connections.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Binds a listener to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "transport listening");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<Arc<TcpConnection>, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = Arc::new(Connection::new(stream));
        tracing::debug!(id = %conn.id(), %addr, "accepted connection");
        Ok(conn)
    }
}

/// Opens a framed TCP connection to a server.
pub async fn connect(addr: &str) -> Result<Arc<TcpConnection>, TransportError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(TransportError::ConnectFailed)?;
    Ok(Arc::new(Connection::new(stream)))
}

/// Opens a connection, retrying a fixed number of times with exponential
/// backoff. Gives up permanently after `attempts` failures.
pub async fn connect_with_retry(
    addr: &str,
    attempts: u32,
    base_delay: Duration,
) -> Result<Arc<TcpConnection>, TransportError> {
    let mut delay = base_delay;
    let mut last_err = None;
    for attempt in 1..=attempts {
        match connect(addr).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                tracing::debug!(addr, attempt, error = %e, "connect failed");
                last_err = Some(e);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
    Err(last_err.unwrap_or_else(|| {
        TransportError::ConnectionClosed("no connect attempts made".into())
    }))
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// A connected pair of in-memory framed connections.
    fn pair() -> (
        Connection<tokio::io::DuplexStream>,
        Connection<tokio::io::DuplexStream>,
    ) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Connection::new(a), Connection::new(b))
    }

    #[tokio::test]
    async fn test_send_recv_round_trip() {
        let (a, b) = pair();
        a.send("hello").await.unwrap();
        assert_eq!(b.recv().await.unwrap(), Some("hello".into()));
    }

    #[tokio::test]
    async fn test_recv_preserves_stream_order() {
        let (a, b) = pair();
        a.send("first").await.unwrap();
        a.send("second").await.unwrap();
        a.send("third").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Some("first".into()));
        assert_eq!(b.recv().await.unwrap(), Some("second".into()));
        assert_eq!(b.recv().await.unwrap(), Some("third".into()));
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_clean_close() {
        let (a, b) = pair();
        a.close().await;
        assert_eq!(b.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let (a, _b) = pair();
        a.close().await;
        let result = a.send("late").await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (a, _b) = pair();
        a.close().await;
        a.close().await;
        assert!(a.is_closed());
    }

    #[tokio::test]
    async fn test_connections_get_distinct_ids() {
        let (a, b) = pair();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_tcp_accept_and_connect() {
        let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
        let addr = acceptor.local_addr().unwrap().to_string();

        let client_task =
            tokio::spawn(async move { connect(&addr).await.unwrap() });
        let server_conn = acceptor.accept().await.unwrap();
        let client_conn = client_task.await.unwrap();

        client_conn.send("over tcp").await.unwrap();
        assert_eq!(server_conn.recv().await.unwrap(), Some("over tcp".into()));
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up_after_attempts() {
        // Nothing listens on this port (bind then drop to reserve-and-free).
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result =
            connect_with_retry(&addr, 2, Duration::from_millis(1)).await;
        assert!(result.is_err());
    }
}

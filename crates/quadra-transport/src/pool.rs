//! Registry of live connections, keyed by connection ID.
//!
//! The dispatcher owns one pool and is the only component that inserts or
//! removes entries (on connect and disconnect).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Connection, ConnectionId};

/// A registry of all live connections.
///
/// Keyed by `ConnectionId` in a `BTreeMap` so iteration (and therefore
/// broadcast delivery order) is stable and deterministic.
pub struct ConnectionPool<S> {
    conns: BTreeMap<ConnectionId, Arc<Connection<S>>>,
}

impl<S> Default for ConnectionPool<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ConnectionPool<S> {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            conns: BTreeMap::new(),
        }
    }

    /// Registers a connection.
    pub fn insert(&mut self, conn: Arc<Connection<S>>)
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static,
    {
        self.conns.insert(conn.id(), conn);
    }

    /// Removes and returns a connection, if present.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Arc<Connection<S>>> {
        self.conns.remove(&id)
    }

    /// Looks up a connection by ID.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection<S>>> {
        self.conns.get(&id).cloned()
    }

    /// Returns the number of live connections.
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// Returns `true` if the pool holds no connections.
    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Returns the IDs of all live connections, in stable order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.conns.keys().copied().collect()
    }
}

impl<S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Send + 'static>
    ConnectionPool<S>
{
    /// Best-effort broadcast: sends `payload` to every member except those
    /// in `exclude`. A failure sending to one member does not abort the
    /// rest. Returns the count of successful deliveries.
    pub async fn broadcast(
        &self,
        payload: &str,
        exclude: &[ConnectionId],
    ) -> usize {
        let mut delivered = 0;
        for (id, conn) in &self.conns {
            if exclude.contains(id) {
                continue;
            }
            match conn.send(payload).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(id = %id, error = %e, "broadcast send failed");
                }
            }
        }
        delivered
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    type DuplexConn = Connection<tokio::io::DuplexStream>;

    /// One server-side connection plus the peer end to read from.
    fn endpoint() -> (Arc<DuplexConn>, Arc<DuplexConn>) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (Arc::new(Connection::new(a)), Arc::new(Connection::new(b)))
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let mut pool = ConnectionPool::new();
        let (conn, _peer) = endpoint();
        let id = conn.id();

        pool.insert(Arc::clone(&conn));
        assert_eq!(pool.len(), 1);
        assert!(pool.get(id).is_some());

        assert!(pool.remove(id).is_some());
        assert!(pool.is_empty());
        assert!(pool.get(id).is_none());
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_all_members() {
        let mut pool = ConnectionPool::new();
        let (a, a_peer) = endpoint();
        let (b, b_peer) = endpoint();
        pool.insert(a);
        pool.insert(b);

        let delivered = pool.broadcast("news", &[]).await;
        assert_eq!(delivered, 2);
        assert_eq!(a_peer.recv().await.unwrap(), Some("news".into()));
        assert_eq!(b_peer.recv().await.unwrap(), Some("news".into()));
    }

    #[tokio::test]
    async fn test_broadcast_skips_excluded_members() {
        let mut pool = ConnectionPool::new();
        let (a, _a_peer) = endpoint();
        let (b, b_peer) = endpoint();
        let excluded = a.id();
        pool.insert(a);
        pool.insert(b);

        let delivered = pool.broadcast("news", &[excluded]).await;
        assert_eq!(delivered, 1);
        assert_eq!(b_peer.recv().await.unwrap(), Some("news".into()));
    }

    #[tokio::test]
    async fn test_broadcast_continues_past_failed_member() {
        let mut pool = ConnectionPool::new();
        let (a, _a_peer) = endpoint();
        let (b, b_peer) = endpoint();
        a.close().await; // sends to a will now fail
        pool.insert(a);
        pool.insert(b);

        let delivered = pool.broadcast("news", &[]).await;
        assert_eq!(delivered, 1, "closed member must not abort the rest");
        assert_eq!(b_peer.recv().await.unwrap(), Some("news".into()));
    }
}

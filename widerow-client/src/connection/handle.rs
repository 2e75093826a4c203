//! Handles to pooled server connections.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use widerow_core::Clock;

use super::clock::ClockResolution;
use super::endpoint::RemoteEndpoint;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct HandleInner {
    id: ConnectionId,
    address: SocketAddr,
    endpoint: Arc<dyn RemoteEndpoint>,
    clock_resolution: ClockResolution,
}

/// A cheaply clonable handle to one pooled connection.
///
/// Two handles are equal when they refer to the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    /// Creates a handle for a connection to `address`.
    pub fn new(
        address: SocketAddr,
        endpoint: Arc<dyn RemoteEndpoint>,
        clock_resolution: ClockResolution,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: ConnectionId::new(),
                address,
                endpoint,
                clock_resolution,
            }),
        }
    }

    /// Returns the connection's unique identifier.
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the remote address of this connection.
    pub fn address(&self) -> SocketAddr {
        self.inner.address
    }

    /// Returns the RPC surface of the server behind this connection.
    pub fn endpoint(&self) -> &dyn RemoteEndpoint {
        self.inner.endpoint.as_ref()
    }

    /// Returns the clock resolution used for writes on this connection.
    pub fn clock_resolution(&self) -> ClockResolution {
        self.inner.clock_resolution
    }

    /// Creates a write stamp using this connection's clock resolution.
    pub fn create_clock(&self) -> Clock {
        self.inner.clock_resolution.create_clock()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.inner.id, self.inner.address)
    }
}

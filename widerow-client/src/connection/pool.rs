//! Connection pools.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use widerow_core::{Result, WideRowError};

use super::clock::ClockResolution;
use super::endpoint::RemoteEndpoint;
use super::handle::ConnectionHandle;
use super::load_balancer::{default_load_balancer, LoadBalancer, RandomLoadBalancer};
use crate::config::{LoadBalancing, PoolConfig};

/// Source of connections for the failover dispatcher.
///
/// Implementations own connection health; every method may be called
/// concurrently from several dispatches.
#[async_trait]
pub trait ConnectionPool: Send + Sync + fmt::Debug {
    /// Hands out a connection, preferring a healthy one other than `excluding`.
    ///
    /// When no healthy alternative exists, implementations may hand out an
    /// unhealthy connection so a recovered host can be re-admitted.
    async fn acquire(&self, excluding: Option<&ConnectionHandle>) -> Result<ConnectionHandle>;

    /// Records that a connection failed and should not be handed out.
    fn mark_unhealthy(&self, handle: &ConnectionHandle);

    /// Records that a connection is usable again.
    fn mark_healthy(&self, handle: &ConnectionHandle);

    /// Returns a connection obtained from [`acquire`](Self::acquire).
    fn release(&self, handle: ConnectionHandle);

    /// Returns the number of connections the pool knows about.
    fn size(&self) -> usize;
}

#[derive(Debug)]
struct PooledConnection {
    handle: ConnectionHandle,
    healthy: AtomicBool,
    in_use: AtomicUsize,
}

/// A pool over a fixed set of connections, one per server.
///
/// Unhealthy connections are skipped while a healthy one is available. Once
/// none is left, an unhealthy connection other than the excluded one is handed
/// out again; a success on it marks it healthy.
#[derive(Debug)]
pub struct StaticConnectionPool {
    connections: Vec<PooledConnection>,
    load_balancer: Arc<dyn LoadBalancer>,
}

impl StaticConnectionPool {
    /// Creates a pool over the given endpoints with round-robin selection.
    pub fn new(
        endpoints: impl IntoIterator<Item = (SocketAddr, Arc<dyn RemoteEndpoint>)>,
        clock_resolution: ClockResolution,
    ) -> Self {
        let connections = endpoints
            .into_iter()
            .map(|(address, endpoint)| PooledConnection {
                handle: ConnectionHandle::new(address, endpoint, clock_resolution),
                healthy: AtomicBool::new(true),
                in_use: AtomicUsize::new(0),
            })
            .collect();

        Self {
            connections,
            load_balancer: default_load_balancer(),
        }
    }

    /// Creates a pool for every address in `config`, obtaining each endpoint from `connect`.
    pub fn from_config<F>(config: &PoolConfig, mut connect: F) -> Self
    where
        F: FnMut(SocketAddr) -> Arc<dyn RemoteEndpoint>,
    {
        let endpoints: Vec<_> = config
            .addresses()
            .iter()
            .map(|&address| (address, connect(address)))
            .collect();

        let pool = Self::new(endpoints, config.clock_resolution());
        match config.load_balancing() {
            LoadBalancing::RoundRobin => pool,
            LoadBalancing::Random => pool.with_load_balancer(Arc::new(RandomLoadBalancer::new())),
        }
    }

    /// Replaces the load balancer.
    pub fn with_load_balancer(mut self, load_balancer: Arc<dyn LoadBalancer>) -> Self {
        self.load_balancer = load_balancer;
        self
    }

    /// Returns handles to every connection in the pool, healthy or not.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.connections.iter().map(|c| c.handle.clone()).collect()
    }

    /// Returns the number of healthy connections.
    pub fn healthy_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|c| c.healthy.load(Ordering::Acquire))
            .count()
    }

    /// Returns whether the given connection is currently healthy.
    pub fn is_healthy(&self, handle: &ConnectionHandle) -> bool {
        self.find(handle)
            .map(|c| c.healthy.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Returns how many acquisitions of `handle` have not been released.
    pub fn in_use(&self, handle: &ConnectionHandle) -> usize {
        self.find(handle)
            .map(|c| c.in_use.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    fn find(&self, handle: &ConnectionHandle) -> Option<&PooledConnection> {
        self.connections.iter().find(|c| c.handle == *handle)
    }

    fn checkout(&self, handle: &ConnectionHandle) -> ConnectionHandle {
        if let Some(pooled) = self.find(handle) {
            pooled.in_use.fetch_add(1, Ordering::AcqRel);
        }
        handle.clone()
    }
}

#[async_trait]
impl ConnectionPool for StaticConnectionPool {
    async fn acquire(&self, excluding: Option<&ConnectionHandle>) -> Result<ConnectionHandle> {
        let candidates: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .filter(|c| c.healthy.load(Ordering::Acquire))
            .filter(|c| excluding.map_or(true, |ex| c.handle != *ex))
            .map(|c| c.handle.clone())
            .collect();

        if let Some(selected) = self.load_balancer.select(&candidates) {
            tracing::trace!(connection = %selected, "acquired connection");
            return Ok(self.checkout(selected));
        }

        // Only the excluded connection is left; hand it back if it is still usable.
        if let Some(ex) = excluding {
            if self.is_healthy(ex) {
                tracing::debug!(connection = %ex, "no alternative connection, reusing excluded one");
                return Ok(self.checkout(ex));
            }
        }

        let unhealthy: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .filter(|c| excluding.map_or(true, |ex| c.handle != *ex))
            .map(|c| c.handle.clone())
            .collect();
        if let Some(selected) = self.load_balancer.select(&unhealthy) {
            tracing::debug!(connection = %selected, "no healthy connections, retrying an unhealthy one");
            return Ok(self.checkout(selected));
        }

        tracing::warn!(pool_size = self.connections.len(), "no usable connections available");
        Err(WideRowError::Unavailable(
            "no usable connections available".to_string(),
        ))
    }

    fn mark_unhealthy(&self, handle: &ConnectionHandle) {
        if let Some(pooled) = self.find(handle) {
            if pooled.healthy.swap(false, Ordering::AcqRel) {
                tracing::warn!(connection = %handle, "connection marked unhealthy");
            }
        }
    }

    fn mark_healthy(&self, handle: &ConnectionHandle) {
        if let Some(pooled) = self.find(handle) {
            if !pooled.healthy.swap(true, Ordering::AcqRel) {
                tracing::info!(connection = %handle, "connection marked healthy");
            }
        }
    }

    fn release(&self, handle: ConnectionHandle) {
        if let Some(pooled) = self.find(&handle) {
            let _ = pooled
                .in_use
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }

    fn size(&self) -> usize {
        self.connections.len()
    }
}

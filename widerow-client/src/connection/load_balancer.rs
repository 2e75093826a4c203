//! Host selection among healthy pooled connections.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use super::handle::ConnectionHandle;

/// A strategy for picking the connection a request is sent to.
pub trait LoadBalancer: Send + Sync {
    /// Selects one of `candidates`.
    ///
    /// Returns `None` if `candidates` is empty.
    fn select<'a>(&self, candidates: &'a [ConnectionHandle]) -> Option<&'a ConnectionHandle>;
}

impl fmt::Debug for dyn LoadBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoadBalancer")
    }
}

/// Cycles through candidates in order.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancer {
    index: AtomicUsize,
}

impl RoundRobinLoadBalancer {
    /// Creates a new round-robin load balancer.
    pub fn new() -> Self {
        Self {
            index: AtomicUsize::new(0),
        }
    }
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn select<'a>(&self, candidates: &'a [ConnectionHandle]) -> Option<&'a ConnectionHandle> {
        if candidates.is_empty() {
            return None;
        }
        let next = self.index.fetch_add(1, Ordering::Relaxed);
        candidates.get(next % candidates.len())
    }
}

/// Picks a candidate at random.
#[derive(Debug, Default)]
pub struct RandomLoadBalancer;

impl RandomLoadBalancer {
    /// Creates a new random load balancer.
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomLoadBalancer {
    fn select<'a>(&self, candidates: &'a [ConnectionHandle]) -> Option<&'a ConnectionHandle> {
        if candidates.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..candidates.len());
        candidates.get(idx)
    }
}

/// Round-robin, the pool's strategy unless configured otherwise.
pub fn default_load_balancer() -> Arc<dyn LoadBalancer> {
    Arc::new(RoundRobinLoadBalancer::new())
}

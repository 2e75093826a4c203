//! Connection handles, pooling and the per-server RPC surface.

mod clock;
mod endpoint;
mod handle;
mod load_balancer;
mod pool;

pub use clock::ClockResolution;
pub use endpoint::{MutationMap, RemoteEndpoint};
pub use handle::{ConnectionHandle, ConnectionId};
pub use load_balancer::{
    default_load_balancer, LoadBalancer, RandomLoadBalancer, RoundRobinLoadBalancer,
};
pub use pool::{ConnectionPool, StaticConnectionPool};

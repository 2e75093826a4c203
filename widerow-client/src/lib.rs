//! Async failover client for a wide-row column store.
//!
//! This crate dispatches reads and writes against a pool of server connections
//! and retries on another connection when one fails. It is built on
//! [Tokio](https://tokio.rs/) and exposes every operation as an `async fn`.
//! The RPC transport itself is supplied by the caller as a
//! [`RemoteEndpoint`] per server.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use widerow_client::{ClientConfig, FailoverPolicy, WideRowClient};
//! use widerow_core::ColumnPath;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .add_address("10.0.0.1:9160".parse()?)
//!         .add_address("10.0.0.2:9160".parse()?)
//!         .failover_policy(FailoverPolicy::on_fail_try_all_available())
//!         .build()?;
//!     let client = WideRowClient::with_endpoints(config, connect);
//!
//!     let keyspace = client.keyspace("Keyspace1").await?;
//!     let path = ColumnPath::new("Users").with_column("name");
//!     keyspace.insert("u1", &path, "Bob").await?;
//!     let column = keyspace.get_column("u1", &path).await?;
//!     println!("{:?}", column);
//!     Ok(())
//! }
//! ```
//!
//! # Keys
//!
//! Every keyspace operation has a `_with` form taking a [`KeyCodec`] for any
//! key type, and a short form taking `&str` keys.
//!
//! # Failover
//!
//! A [`FailoverPolicy`] bounds how many other connections an operation is
//! tried on and which errors are retried. `NotFound` is never retried; point
//! reads report it as `Ok(None)`.
//!
//! [`KeyCodec`]: widerow_core::KeyCodec

#![warn(missing_docs)]

mod batch;
mod client;
pub mod config;
pub mod config_file;
pub mod connection;
pub mod failover;
mod keyspace;
pub mod operation;

pub use batch::{BatchMutation, MutationsByKey};
pub use client::WideRowClient;
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigError, FailoverPolicy, FailoverPolicyBuilder,
    LoadBalancing, PoolConfig, PoolConfigBuilder,
};
pub use connection::{
    ClockResolution, ConnectionHandle, ConnectionId, ConnectionPool, LoadBalancer, MutationMap,
    RandomLoadBalancer, RemoteEndpoint, RoundRobinLoadBalancer, StaticConnectionPool,
};
pub use failover::FailoverOperator;
pub use keyspace::Keyspace;
pub use operation::{Operation, OperationType};
pub use widerow_core as core;

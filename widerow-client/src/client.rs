//! Client entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::instrument;
use widerow_core::{translate, KeyspaceDescription, Result, WideRowError};

use crate::config::ClientConfig;
use crate::connection::{ConnectionHandle, ConnectionPool, RemoteEndpoint, StaticConnectionPool};
use crate::failover::FailoverOperator;
use crate::keyspace::Keyspace;
use crate::operation::Operation;

/// The main entry point for talking to the store.
///
/// A client owns the configuration and the connection pool shared by every
/// keyspace it opens.
///
/// # Example
///
/// ```ignore
/// use widerow_client::{ClientConfig, WideRowClient};
///
/// let client = WideRowClient::with_endpoints(ClientConfig::default(), |addr| connect(addr));
/// let keyspace = client.keyspace("Keyspace1").await?;
/// keyspace.insert_at("u1", &ColumnPath::new("Users").with_column("name"), "Bob", 100).await?;
/// ```
#[derive(Debug, Clone)]
pub struct WideRowClient {
    config: Arc<ClientConfig>,
    pool: Arc<dyn ConnectionPool>,
}

impl WideRowClient {
    /// Creates a client over an existing pool.
    pub fn new(config: ClientConfig, pool: Arc<dyn ConnectionPool>) -> Self {
        tracing::info!(
            pool_size = pool.size(),
            consistency = %config.consistency_level(),
            "created wide-row client"
        );
        Self {
            config: Arc::new(config),
            pool,
        }
    }

    /// Creates a client with a [`StaticConnectionPool`] over the configured
    /// addresses, obtaining each endpoint from `connect`.
    pub fn with_endpoints<F>(config: ClientConfig, connect: F) -> Self
    where
        F: FnMut(SocketAddr) -> Arc<dyn RemoteEndpoint>,
    {
        let pool = StaticConnectionPool::from_config(config.pool(), connect);
        Self::new(config, Arc::new(pool))
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    /// Opens a keyspace.
    ///
    /// The column family description is fetched once, with failover, and the
    /// returned keyspace starts on the connection that served it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the keyspace does not exist, or the last error
    /// seen if no connection could serve the description.
    #[instrument(name = "client.keyspace", skip(self), fields(keyspace = %name))]
    pub async fn keyspace(&self, name: &str) -> Result<Keyspace> {
        let connection = self.pool.acquire(None).await?;

        let mut op = Operation::read("describe_keyspace", move |conn: ConnectionHandle| async move {
            conn.endpoint()
                .describe_keyspace(name)
                .await
                .map_err(translate)
        });

        let operator = FailoverOperator::new(self.pool.as_ref(), self.config.failover());
        let used = match operator.operate(&mut op, connection.clone()).await {
            Ok(used) => used,
            Err(e) => {
                self.pool.release(connection);
                return Err(e);
            }
        };
        if used != connection {
            self.pool.release(connection);
        }

        let families = op.into_result().ok_or_else(|| {
            WideRowError::unknown(format!("no description returned for keyspace {name}"))
        })?;
        tracing::info!(
            families = families.len(),
            connection = %used,
            "opened keyspace"
        );

        Ok(Keyspace::new(
            name,
            KeyspaceDescription::new(families),
            self.config.consistency_level(),
            self.config.failover().clone(),
            Arc::clone(&self.pool),
            used,
        ))
    }
}

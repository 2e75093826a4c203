//! Dispatching operations with failover across pooled connections.

use tracing::instrument;
use widerow_core::{ErrorKind, Result};

use crate::config::FailoverPolicy;
use crate::connection::{ConnectionHandle, ConnectionPool};
use crate::operation::Operation;

/// Executes operations, moving to another connection when one fails.
///
/// The effective retry budget for one dispatch is the policy's budget for the
/// operation type, capped at the pool size. Only errors the policy lists as
/// retryable trigger a switch; `Unavailable` errors also mark the failing
/// connection unhealthy. A success marks the serving connection healthy.
#[derive(Debug)]
pub struct FailoverOperator<'p> {
    pool: &'p dyn ConnectionPool,
    policy: &'p FailoverPolicy,
}

impl<'p> FailoverOperator<'p> {
    /// Creates an operator over `pool` following `policy`.
    pub fn new(pool: &'p dyn ConnectionPool, policy: &'p FailoverPolicy) -> Self {
        Self { pool, policy }
    }

    fn retry_budget<T>(&self, op: &Operation<'_, T>) -> u32 {
        let by_policy = self.policy.retries_for(op.op_type());
        let by_pool = u32::try_from(self.pool.size()).unwrap_or(u32::MAX);
        by_policy.min(by_pool)
    }

    /// Executes `op`, starting on `current`.
    ///
    /// On success returns the connection that completed the operation. When it
    /// differs from `current`, it was acquired from the pool and the caller is
    /// responsible for releasing it. On failure every connection acquired
    /// during the dispatch has been released and the last error is returned.
    #[instrument(
        name = "failover.operate",
        skip_all,
        fields(
            operation = op.name(),
            op_type = %op.op_type(),
            connection = %current,
            retries = self.retry_budget(op)
        )
    )]
    pub async fn operate<'a, T: Send + 'a>(
        &self,
        op: &mut Operation<'a, T>,
        current: ConnectionHandle,
    ) -> Result<ConnectionHandle> {
        let mut remaining = self.retry_budget(op);
        let mut connection = current.clone();
        let mut acquired = false;

        loop {
            let error = match op.execute(&connection).await {
                Ok(()) => {
                    self.pool.mark_healthy(&connection);
                    if acquired && connection == current {
                        // The pool handed back the connection we started on.
                        self.pool.release(connection.clone());
                    }
                    return Ok(connection);
                }
                Err(e) => e,
            };

            if !self.policy.is_retryable(&error) {
                tracing::warn!(
                    connection = %connection,
                    error = %error,
                    "operation failed with non-retryable error"
                );
                self.release_acquired(connection, acquired);
                return Err(error);
            }

            if remaining == 0 {
                tracing::error!(
                    connection = %connection,
                    attempts = op.attempts(),
                    error = %error,
                    "retry budget exhausted"
                );
                self.release_acquired(connection, acquired);
                return Err(error);
            }

            tracing::warn!(
                connection = %connection,
                attempt = op.attempts(),
                error = %error,
                "operation failed, trying another connection"
            );

            if error.kind() == ErrorKind::Unavailable {
                self.pool.mark_unhealthy(&connection);
            }

            let next = match self.pool.acquire(Some(&connection)).await {
                Ok(next) => next,
                Err(acquire_error) => {
                    tracing::error!(
                        error = %acquire_error,
                        "could not acquire a replacement connection"
                    );
                    self.release_acquired(connection, acquired);
                    return Err(error);
                }
            };

            tracing::debug!(from = %connection, to = %next, "switching connection");
            self.release_acquired(connection, acquired);
            connection = next;
            acquired = true;
            remaining -= 1;

            let pause = self.policy.pause_before_retry();
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
    }

    fn release_acquired(&self, connection: ConnectionHandle, acquired: bool) {
        if acquired {
            self.pool.release(connection);
        }
    }
}

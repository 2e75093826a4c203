//! Units of work dispatched with failover.
//!
//! An [`Operation`] wraps one logical RPC call together with its read or write
//! classification. The failover dispatcher may execute it several times, on
//! different connections, until it completes or the retry budget runs out.

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use widerow_core::{ErrorKind, Result, WideRowError};

use crate::connection::ConnectionHandle;

/// Classification of an operation, used to pick a retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Reads data without side effects.
    Read,
    /// Writes or removes data.
    Write,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Read => f.write_str("read"),
            OperationType::Write => f.write_str("write"),
        }
    }
}

type Body<'a, T> = Box<dyn Fn(ConnectionHandle) -> BoxFuture<'a, Result<T>> + Send + Sync + 'a>;

/// A retryable unit of work.
///
/// The body issues exactly one RPC against the connection it is given and
/// translates any failure into a [`WideRowError`]. Errors whose kind the
/// operation handles (see [`handling`](Self::handling)) complete the operation
/// with no result instead of failing the dispatch.
pub struct Operation<'a, T> {
    name: &'static str,
    op_type: OperationType,
    body: Body<'a, T>,
    handled: Vec<ErrorKind>,
    attempts: u32,
    result: Option<T>,
    exception: Option<WideRowError>,
}

impl<'a, T: Send + 'a> Operation<'a, T> {
    /// Creates an operation of the given type.
    pub fn new<F, Fut>(name: &'static str, op_type: OperationType, body: F) -> Self
    where
        F: Fn(ConnectionHandle) -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        Self {
            name,
            op_type,
            body: Box::new(move |connection| Box::pin(body(connection))),
            handled: Vec::new(),
            attempts: 0,
            result: None,
            exception: None,
        }
    }

    /// Creates a read operation.
    pub fn read<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: Fn(ConnectionHandle) -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        Self::new(name, OperationType::Read, body)
    }

    /// Creates a write operation.
    pub fn write<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: Fn(ConnectionHandle) -> Fut + Send + Sync + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        Self::new(name, OperationType::Write, body)
    }

    /// Treats errors of `kind` as a completed operation without a result.
    pub fn handling(mut self, kind: ErrorKind) -> Self {
        if !self.handled.contains(&kind) {
            self.handled.push(kind);
        }
        self
    }

    /// Executes the body once against `connection`.
    ///
    /// Returns `Ok(())` when the operation completed, either with a result or
    /// with a handled error recorded. Any other error is returned for the
    /// dispatcher to classify.
    pub async fn execute(&mut self, connection: &ConnectionHandle) -> Result<()> {
        self.attempts += 1;

        match (self.body)(connection.clone()).await {
            Ok(value) => {
                self.result = Some(value);
                self.exception = None;
                Ok(())
            }
            Err(e) if self.handled.contains(&e.kind()) => {
                tracing::debug!(
                    operation = self.name,
                    connection = %connection,
                    error = %e,
                    "operation completed with handled error"
                );
                self.result = None;
                self.exception = Some(e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl<'a, T> Operation<'a, T> {
    /// Returns the operation's name, used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns whether this is a read or a write.
    pub fn op_type(&self) -> OperationType {
        self.op_type
    }

    /// Returns how many times the body has been executed.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the captured result.
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Returns the handled error recorded by the last execution.
    pub fn exception(&self) -> Option<&WideRowError> {
        self.exception.as_ref()
    }

    /// Returns `true` if the last execution recorded a handled error.
    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    /// Consumes the operation, returning the captured result.
    pub fn into_result(self) -> Option<T> {
        self.result
    }
}

impl<T> fmt::Debug for Operation<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("op_type", &self.op_type)
            .field("attempts", &self.attempts)
            .field("completed", &self.result.is_some())
            .field("exception", &self.exception)
            .finish()
    }
}

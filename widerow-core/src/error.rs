//! Error types for keyspace operations.

use thiserror::Error;

/// Boxed error kept as the cause of an [`WideRowError::Unknown`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The canonical error surfaced by every keyspace operation.
///
/// Transport and protocol failures are translated into one of these variants at
/// the point where the RPC is issued, so callers never observe a raw wire error.
#[derive(Debug, Error)]
pub enum WideRowError {
    /// The requested row, column or super column does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request does not match the keyspace schema or was rejected by the server.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server or connection could not serve the request.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The request exceeded a server or transport deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A key could not be converted to or from its byte representation.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other failure. The original message is preserved.
    #[error("unknown error: {message}")]
    Unknown {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if one was available.
        #[source]
        source: Option<BoxError>,
    },
}

/// Discriminant of a [`WideRowError`], used by failover policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`WideRowError::NotFound`].
    NotFound,
    /// See [`WideRowError::InvalidRequest`].
    InvalidRequest,
    /// See [`WideRowError::Unavailable`].
    Unavailable,
    /// See [`WideRowError::Timeout`].
    Timeout,
    /// See [`WideRowError::Serialization`].
    Serialization,
    /// See [`WideRowError::Unknown`].
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::InvalidRequest => "invalid-request",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "not-found" => Ok(ErrorKind::NotFound),
            "invalid-request" => Ok(ErrorKind::InvalidRequest),
            "unavailable" => Ok(ErrorKind::Unavailable),
            "timeout" => Ok(ErrorKind::Timeout),
            "serialization" => Ok(ErrorKind::Serialization),
            "unknown" => Ok(ErrorKind::Unknown),
            _ => Err(format!("unknown error kind: {s}")),
        }
    }
}

impl WideRowError {
    /// Creates an [`WideRowError::Unknown`] without an underlying cause.
    pub fn unknown(message: impl Into<String>) -> Self {
        WideRowError::Unknown {
            message: message.into(),
            source: None,
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WideRowError::NotFound(_) => ErrorKind::NotFound,
            WideRowError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            WideRowError::Unavailable(_) => ErrorKind::Unavailable,
            WideRowError::Timeout(_) => ErrorKind::Timeout,
            WideRowError::Serialization(_) => ErrorKind::Serialization,
            WideRowError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Returns `true` if this error reports a missing item.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WideRowError::NotFound(_))
    }
}

/// A specialized `Result` type for keyspace operations.
pub type Result<T> = std::result::Result<T, WideRowError>;

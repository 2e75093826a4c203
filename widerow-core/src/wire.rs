//! Wire-level errors and their translation into [`WideRowError`].
//!
//! Remote endpoints report failures with [`WireError`], which mirrors the
//! exceptions the RPC protocol can raise. [`translate`] is the single place that
//! maps them onto the canonical taxonomy; the `From` impl routes through it so an
//! RPC body can translate at the point of catch with `?`.

use std::io;

use thiserror::Error;

use crate::error::WideRowError;

/// An error raised by the transport or the remote protocol.
#[derive(Debug, Error)]
pub enum WireError {
    /// The transport failed (closed socket, broken frame, refused connection).
    #[error("transport failure: {0}")]
    Transport(String),

    /// An I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The server has no data for the requested item.
    #[error("not found")]
    NotFound,

    /// The server rejected the request as malformed.
    #[error("invalid request: {why}")]
    InvalidRequest {
        /// Server-provided explanation.
        why: String,
    },

    /// Not enough replicas were alive to satisfy the consistency level.
    #[error("unavailable")]
    Unavailable,

    /// The server did not answer within its deadline.
    #[error("timed out")]
    TimedOut,

    /// Login was refused.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The authenticated user may not perform the request.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// Any other application-level exception raised by the server.
    #[error("application error: {0}")]
    Application(String),
}

/// A specialized `Result` type for raw endpoint calls.
pub type WireResult<T> = std::result::Result<T, WireError>;

/// Maps a wire error onto the canonical taxonomy.
///
/// The mapping is total: every wire error yields a [`WideRowError`].
pub fn translate(error: WireError) -> WideRowError {
    match error {
        WireError::Transport(msg) => WideRowError::Unavailable(msg),
        WireError::Io(e) => WideRowError::Unavailable(e.to_string()),
        WireError::NotFound => WideRowError::NotFound("no data for requested path".to_string()),
        WireError::InvalidRequest { why } => WideRowError::InvalidRequest(why),
        WireError::Unavailable => {
            WideRowError::Unavailable("not enough replicas available".to_string())
        }
        WireError::TimedOut => WideRowError::Timeout("request timed out".to_string()),
        other @ (WireError::Authentication(_)
        | WireError::Authorization(_)
        | WireError::Application(_)) => WideRowError::Unknown {
            message: other.to_string(),
            source: Some(Box::new(other)),
        },
    }
}

impl From<WireError> for WideRowError {
    fn from(error: WireError) -> Self {
        translate(error)
    }
}

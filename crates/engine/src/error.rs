//! Error taxonomy (`spec.md` §7).
//!
//! Categories 3-6 are recoverable: the connection keeps running and the
//! failure is reported back to whoever issued the call, or surfaced on the
//! `unhandled` channel. Categories 1 and strict-mode 2 tear the connection
//! down; [`EngineError::is_fatal`] tells the two apart.

use std::io;

use thiserror::Error;

use crate::message::RpcError;

/// Errors surfaced by the protocol engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Category 1: the underlying transport failed or closed.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// Category 2: a complete frame failed JSON-RPC parsing (strict mode only;
    /// lenient mode holds the buffer instead of raising this, per §4.1).
    #[error("malformed frame: {0}")]
    FrameDecode(String),

    /// Category 3: `method` isn't present in the handler table.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// Category 4: a handler completed with an application-level error.
    #[error("handler error: {0}")]
    Handler(String),

    /// Category 5: a notification's `method` doesn't parse as a URL at all.
    #[error("invalid stream reference: {0}")]
    InvalidStreamReference(String),

    /// The connection (and therefore every pending call and endpoint on it)
    /// was torn down before this call/endpoint reached a terminal state.
    #[error("connection closed")]
    ConnectionClosed,

    /// A pending call was abandoned locally via `PendingCall::abort`.
    #[error("call aborted locally")]
    Aborted,

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl EngineError {
    /// Category 1 and strict-mode category 2 are fatal to the connection;
    /// everything else is locally recoverable (§7 propagation policy).
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Transport(_) | EngineError::FrameDecode(_))
    }
}

impl From<EngineError> for RpcError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::InvalidMethod(method) => RpcError::invalid_method(method),
            other => RpcError::internal(other.to_string()),
        }
    }
}

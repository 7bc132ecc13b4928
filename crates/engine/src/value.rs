//! The value shapes carried in positional slots once a stream endpoint is
//! allowed to sit alongside plain JSON (`spec.md` §4.2, §4.3).
//!
//! Two distinct shapes exist because a stream value flows through the
//! engine in one of two directions, and the half each side holds differs
//! accordingly:
//! - A handler *produces* a [`HandlerValue`]: for a stream slot it hands the
//!   engine the draining/feeding half of a channel it keeps the other half
//!   of (typically moved into a task the handler spawns before returning).
//! - An `invoke` caller *receives* an [`InvokeValue`]: for a stream slot the
//!   engine has already registered its own draining/feeding half, and hands
//!   the caller the object half they read from or write to directly.

use serde_json::Value;

use crate::stream::{StreamSink, StreamSinkHandle, StreamSource, StreamSourceHandle};

/// One positional slot of a handler's result.
pub enum HandlerValue {
    /// An ordinary JSON value, carried through unchanged.
    Json(Value),
    /// A producer: the engine mints a `readable` pointer and drains this
    /// handle itself, forwarding each chunk as an outgoing notification.
    Sink(StreamSinkHandle),
    /// A consumer: the engine mints a `writable` pointer and feeds this
    /// handle from inbound notifications addressed to it.
    Source(StreamSourceHandle),
}

impl HandlerValue {
    pub fn json(value: impl Into<Value>) -> Self {
        HandlerValue::Json(value.into())
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            HandlerValue::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for HandlerValue {
    fn from(value: Value) -> Self {
        HandlerValue::Json(value)
    }
}

impl std::fmt::Debug for HandlerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerValue::Json(value) => write!(f, "HandlerValue::Json({value})"),
            HandlerValue::Sink(_) => write!(f, "HandlerValue::Sink(..)"),
            HandlerValue::Source(_) => write!(f, "HandlerValue::Source(..)"),
        }
    }
}

/// One positional slot of an `invoke` resolution.
pub enum InvokeValue {
    /// An ordinary JSON value, carried through unchanged.
    Json(Value),
    /// The bound mirror of a remote `writable` pointer: write into it, the
    /// engine forwards each write as an outgoing notification.
    Sink(StreamSink),
    /// The bound mirror of a remote `readable` pointer: read from it, the
    /// engine feeds it from inbound notifications.
    Source(StreamSource),
}

impl InvokeValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            InvokeValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            InvokeValue::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Debug for InvokeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvokeValue::Json(value) => write!(f, "InvokeValue::Json({value})"),
            InvokeValue::Sink(_) => write!(f, "InvokeValue::Sink(..)"),
            InvokeValue::Source(_) => write!(f, "InvokeValue::Source(..)"),
        }
    }
}

//! Stream endpoints: the local object-mode handles that sit behind a
//! [`crate::pointer::StreamPointer`] (`spec.md` §4.3).
//!
//! A `readable` pointer's mirror on the receiving side is a [`StreamSource`]:
//! chunks arrive over the wire as notifications and are pushed into it.
//! A `writable` pointer's mirror is a [`StreamSink`]: the local side calls
//! `send`/`end` and those become outgoing notifications. Both are backed by
//! bounded `tokio::sync::mpsc` channels, mirroring the channel-per-endpoint
//! shape the teacher's reader/writer split uses for its own I/O.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::EngineError;

/// Default channel capacity for a stream endpoint's internal buffer.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A locally-readable mirror of a remote `readable` stream.
///
/// `null` on the wire terminates the stream; once exhausted, `recv` keeps
/// returning `None` rather than erroring (`spec.md` §4.3's "absorbing
/// terminal state").
#[derive(Debug)]
pub struct StreamSource {
    rx: mpsc::Receiver<Value>,
}

impl StreamSource {
    /// Builds a connected pair: the handle is the push side (fed by the
    /// engine as notifications arrive), `Self` is the pull side (read by
    /// whoever owns the stream — a handler consuming a `writable` pointer,
    /// or an `invoke` caller bound to a `readable` one).
    pub fn channel() -> (StreamSourceHandle, Self) {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        (StreamSourceHandle { tx }, Self { rx })
    }

    /// Awaits the next chunk, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

/// The push side of a [`StreamSource`] channel. Handed to the engine — by a
/// handler that wants to consume a `writable` pointer, or internally when a
/// client binds a `readable` response pointer — so it can feed arriving
/// notification payloads in.
#[derive(Debug, Clone)]
pub struct StreamSourceHandle {
    tx: mpsc::Sender<Value>,
}

impl StreamSourceHandle {
    /// Delivers one chunk. Returns `Err` if the consumer dropped the
    /// [`StreamSource`] (the only local way a readable endpoint goes away
    /// early; `spec.md` has no explicit cancel-from-receiver signal).
    pub(crate) async fn push(&self, chunk: Value) -> Result<(), EngineError> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| EngineError::ConnectionClosed)
    }
}

/// A locally-writable mirror of a remote `writable` stream.
///
/// Writes queue onto an internal channel; the connection's writer task
/// drains it and emits notifications addressed to the pointer's method name.
/// Dropping a `StreamSink` without calling [`StreamSink::end`] still ends the
/// stream on the wire, since the drain side observes the channel closing.
#[derive(Debug, Clone)]
pub struct StreamSink {
    tx: mpsc::Sender<Option<Value>>,
}

impl StreamSink {
    /// Builds a connected pair: `Self` is the write side (kept by whoever
    /// produces the data — a handler emitting a `readable` pointer, or an
    /// `invoke` caller bound to a `writable` one), the handle is the drain
    /// side (handed to the engine to forward as outgoing notifications).
    pub fn channel() -> (Self, StreamSinkHandle) {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        (Self { tx }, StreamSinkHandle { rx })
    }

    /// Queues a chunk for delivery.
    pub async fn send(&self, chunk: Value) -> Result<(), EngineError> {
        self.tx
            .send(Some(chunk))
            .await
            .map_err(|_| EngineError::ConnectionClosed)
    }

    /// Queues the `null` terminator. No further `send` calls should follow.
    pub async fn end(&self) -> Result<(), EngineError> {
        self.tx
            .send(None)
            .await
            .map_err(|_| EngineError::ConnectionClosed)
    }
}

/// The drain side of a [`StreamSink`] channel. The engine's forwarding task
/// drains it to produce outgoing notifications for the pointer it was
/// minted/bound under.
#[derive(Debug)]
pub struct StreamSinkHandle {
    rx: mpsc::Receiver<Option<Value>>,
}

impl StreamSinkHandle {
    /// Awaits the next queued chunk. `Ok(None)` is the explicit terminator;
    /// `Err(())` means the [`StreamSink`] was dropped without calling `end`,
    /// which the writer task treats identically (send the terminator once).
    pub(crate) async fn next(&mut self) -> Result<Option<Value>, ()> {
        match self.rx.recv().await {
            Some(chunk) => Ok(chunk),
            None => Err(()),
        }
    }
}
